#![allow(non_snake_case)]

use wildmon_client::{
    ClientConfig,
    Error,
    ThrowOutcome,
    encounter::{
        MonsterRecord,
        throw_roll,
    },
    ledger::SubmitError,
    test_helpers::{
        PLAYER_STRENGTH,
        TestContext,
        WILD_MONSTER_HEALTH,
        find_entropy,
    },
    types::{
        ComponentKey,
        ComponentValue,
        Position,
    },
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn spawn__places_the_player_at_the_wrapped_position() {
    init_tracing();
    let ctx = TestContext::new();
    let player = ctx.player(1).await;

    // when spawning past the map's right edge
    player.client.spawn(Position::new(9, 1)).await.unwrap();

    // then the position wrapped onto the torus, everywhere
    let expected = Position::new(1, 1);
    assert_eq!(player.client.position_of(player.entity), Some(expected));
    assert_eq!(
        ctx.ledger
            .authoritative(player.entity, ComponentKey::Position),
        Some(ComponentValue::Position(expected))
    );
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn spawn__twice_is_rejected_without_a_second_submission() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let submissions_before = ctx.ledger.submission_log().len();

    // when
    let result = player.client.spawn(Position::new(2, 2)).await;

    // then
    assert!(matches!(result, Err(Error::AlreadySpawned)));
    assert_eq!(ctx.ledger.submission_log().len(), submissions_before);
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn spawn__read_only_client_is_rejected_before_submitting() {
    let ctx = TestContext::new();
    let client = ctx.read_only().await;

    // when
    let result = client.spawn(Position::new(1, 1)).await;

    // then
    assert!(matches!(result, Err(Error::NoSigner)));
    assert!(ctx.ledger.submission_log().is_empty());
}

#[tokio::test]
async fn move_to__updates_the_authoritative_position() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // when
    player.client.move_to(Position::new(2, 1)).await.unwrap();

    // then
    assert_eq!(
        player.client.position_of(player.entity),
        Some(Position::new(2, 1))
    );
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn move_by__steps_relative_to_the_effective_position() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // when
    player.client.move_by(1, 2).await.unwrap();

    // then
    assert_eq!(
        player.client.position_of(player.entity),
        Some(Position::new(2, 3))
    );
}

#[tokio::test]
async fn move_to__width_edge_is_equivalent_to_the_origin_column() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // when moving to (width, 0) on an 8-wide map
    player.client.move_to(Position::new(8, 0)).await.unwrap();

    // then the player stands at (0, 0)
    assert_eq!(
        player.client.position_of(player.entity),
        Some(Position::new(0, 0))
    );
}

#[tokio::test]
async fn move_to__an_obstructed_cell_performs_no_submission() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let submissions_before = ctx.ledger.submission_log().len();

    // when targeting the boulder cell
    let result = player.client.move_to(Position::new(3, 2)).await;

    // then nothing was submitted and every view still shows the old spot
    assert!(matches!(result, Err(Error::Obstructed(_))));
    assert_eq!(ctx.ledger.submission_log().len(), submissions_before);
    assert_eq!(
        player.client.position_of(player.entity),
        Some(Position::new(1, 1))
    );
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn move_to__is_rejected_while_engaged_in_an_encounter() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    // when
    let result = player.client.move_to(Position::new(2, 1)).await;

    // then
    assert!(matches!(result, Err(Error::EngagedInEncounter)));
}

#[tokio::test]
async fn move_to__onto_grass_can_pull_the_player_into_an_encounter() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // given an entropy word that starts an encounter on this cell
    let destination = Position::new(5, 1);
    let entity = player.entity;
    ctx.ledger.set_entropy(find_entropy(|entropy| {
        wildmon_client::encounter::should_start_encounter(entity, destination, entropy)
    }));

    // when
    player.client.move_to(destination).await.unwrap();

    // then the encounter component appeared with a single wild monster
    let encounter = player.client.encounter_of(player.entity).unwrap();
    assert_eq!(encounter.action_count, 1);
    assert_eq!(encounter.monsters.len(), 1);
    let record = player.client.monster_of(encounter.monsters[0]).unwrap();
    assert_eq!(record.health, WILD_MONSTER_HEALTH);
    assert_eq!(record.owner, None);
}

#[tokio::test]
async fn move_to__presents_the_override_until_confirmation_lands() {
    init_tracing();
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // given a feed that sits on its events for a while
    ctx.ledger.pause_events(true);
    let client = player.client.clone();
    let pending = tokio::spawn(async move { client.move_to(Position::new(4, 1)).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // then the effective view already shows the destination while the
    // replica still holds the old authoritative value
    assert_eq!(
        player.client.position_of(player.entity),
        Some(Position::new(4, 1))
    );
    assert_eq!(
        player
            .replica
            .get(player.entity, ComponentKey::Position)
            .and_then(|value| value.as_position()),
        Some(Position::new(1, 1))
    );
    assert_eq!(player.overrides.live_count(), 1);

    // when the feed catches up
    ctx.ledger.pause_events(false);
    pending.await.unwrap().unwrap();

    // then the override is gone and authority took over
    assert_eq!(player.overrides.live_count(), 0);
    assert_eq!(
        player
            .replica
            .get(player.entity, ComponentKey::Position)
            .and_then(|value| value.as_position()),
        Some(Position::new(4, 1))
    );
}

#[tokio::test]
async fn throw_ball__even_roll_captures_the_monster() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    let entity = player.entity;
    ctx.ledger
        .set_entropy(find_entropy(|e| throw_roll(entity, monster, 1, e) % 2 == 0));

    // when
    let outcome = player.client.throw_ball(monster).await.unwrap();

    // then ownership transferred and the encounter is over
    assert_eq!(outcome, ThrowOutcome::Caught);
    assert_eq!(
        player.client.monster_of(monster).unwrap().owner,
        Some(player.entity)
    );
    assert_eq!(player.client.encounter_of(player.entity), None);
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn throw_ball__odd_roll_is_a_miss_that_advances_the_action_count() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    let entity = player.entity;
    ctx.ledger
        .set_entropy(find_entropy(|e| throw_roll(entity, monster, 1, e) % 2 == 1));

    // when
    let outcome = player.client.throw_ball(monster).await.unwrap();

    // then the encounter is still on, one action further in
    assert_eq!(outcome, ThrowOutcome::Miss);
    let encounter = player.client.encounter_of(player.entity).unwrap();
    assert_eq!(encounter.action_count, 2);
}

#[tokio::test]
async fn throw_ball__third_odd_roll_lets_the_monster_escape_for_good() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    // given an entropy word that rolls odd on all three actions
    let entity = player.entity;
    ctx.ledger.set_entropy(find_entropy(|e| {
        (1..=3).all(|count| throw_roll(entity, monster, count, e) % 2 == 1)
    }));

    // when
    let first = player.client.throw_ball(monster).await.unwrap();
    let second = player.client.throw_ball(monster).await.unwrap();
    let third = player.client.throw_ball(monster).await.unwrap();

    // then two misses, then the monster is gone with the encounter
    assert_eq!(first, ThrowOutcome::Miss);
    assert_eq!(second, ThrowOutcome::Miss);
    assert_eq!(third, ThrowOutcome::Fled);
    assert_eq!(player.client.monster_of(monster), None);
    assert_eq!(player.client.encounter_of(player.entity), None);

    // and the encounter's deletion is terminal
    let result = player.client.throw_ball(monster).await;
    assert!(matches!(result, Err(Error::NotInEncounter)));
}

#[tokio::test]
async fn throw_ball__without_an_encounter_performs_no_submission() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    let submissions_before = ctx.ledger.submission_log().len();

    // when
    let result = player.client.throw_ball(monster).await;

    // then
    assert!(matches!(result, Err(Error::NotInEncounter)));
    assert_eq!(ctx.ledger.submission_log().len(), submissions_before);
}

#[tokio::test]
async fn attack__reduces_monster_health_by_the_player_strength() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    // when
    player.client.attack(monster).await.unwrap();

    // then
    let record = player.client.monster_of(monster).unwrap();
    assert_eq!(record.health, 10 - PLAYER_STRENGTH as i64);
    // attacking does not end the encounter
    assert!(player.client.encounter_of(player.entity).is_some());
}

#[tokio::test]
async fn attack__can_drive_health_below_zero() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(1, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    // when
    player.client.attack(monster).await.unwrap();

    // then health went negative and the record survived
    let record = player.client.monster_of(monster).unwrap();
    assert_eq!(record.health, 1 - PLAYER_STRENGTH as i64);
}

#[tokio::test]
async fn flee__ends_the_encounter_and_repeating_it_never_errors() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();
    let monster = ctx.ledger.place_monster(MonsterRecord::wild(10, 1));
    ctx.ledger.begin_encounter(player.entity, monster);
    wait_for_encounter(&player).await;

    // when fleeing twice in a row
    player.client.flee().await.unwrap();
    player.client.flee().await.unwrap();

    // then both land in the no-encounter state
    assert_eq!(player.client.encounter_of(player.entity), None);
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn confirmation_timeout__surfaces_after_releasing_overrides() {
    let ctx = TestContext::with_config(ClientConfig {
        retry_count: 3,
        confirmation_timeout_ms: 100,
        event_buffer: 64,
    });
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // given a ledger that executes but never confirms
    ctx.ledger.mute_confirmations(true);

    // when
    let result = player.client.move_to(Position::new(2, 1)).await;

    // then the deadline fired and no override leaked
    assert!(matches!(result, Err(Error::ConfirmationTimeout(_))));
    assert_eq!(player.overrides.live_count(), 0);
}

#[tokio::test]
async fn execute__recovers_from_a_sequence_conflict_with_the_next_number() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // given an out-of-band operation consumed the next number
    ctx.ledger.set_sequence(player.address, 2);

    // when
    player.client.move_to(Position::new(2, 1)).await.unwrap();

    // then the stale attempt and the recovery both show in the log
    assert_eq!(ctx.ledger.submission_log(), vec![0, 1, 2]);
}

#[tokio::test]
async fn submission_log__stays_strictly_increasing_across_transport_retries() {
    let ctx = TestContext::new();
    let player = ctx.player(1).await;
    player.client.spawn(Position::new(1, 1)).await.unwrap();

    // given a transient transport failure on the next submission
    ctx.ledger
        .fail_next_submission(SubmitError::Transport("connection reset".into()));

    // when
    player.client.move_to(Position::new(2, 1)).await.unwrap();
    player.client.move_to(Position::new(2, 2)).await.unwrap();

    // then every observed sequence is strictly greater than the last
    let log = ctx.ledger.submission_log();
    assert!(log.windows(2).all(|pair| pair[0] < pair[1]), "log: {log:?}");
}

#[tokio::test]
async fn seed__a_late_joining_client_sees_earlier_authoritative_state() {
    let ctx = TestContext::new();
    let first = ctx.player(1).await;
    first.client.spawn(Position::new(1, 1)).await.unwrap();

    // when a second client joins afterwards
    let second = ctx.player(2).await;

    // then its seeded replica already contains the first player
    assert_eq!(
        second.client.position_of(first.entity),
        Some(Position::new(1, 1))
    );
}

/// The begin_encounter helper emits a delta; wait until this client's pump
/// has applied it.
async fn wait_for_encounter(player: &wildmon_client::test_helpers::PlayerHarness) {
    for _ in 0..100 {
        if player.client.encounter_of(player.entity).is_some() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("encounter delta never arrived");
}
