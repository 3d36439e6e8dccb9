#![allow(non_snake_case)]

use super::*;

fn entity(tag: u8) -> EntityId {
    EntityId([tag; 32])
}

/// Search the entropy space for a word whose derived roll satisfies the
/// given predicate. Resolution is deterministic, so tests pick their
/// outcome instead of hardcoding magic words.
fn entropy_where(
    player: EntityId,
    monster: EntityId,
    action_count: u64,
    wanted: impl Fn(u64) -> bool,
) -> [u8; 32] {
    for seed in 0u16..2048 {
        let mut entropy = [0u8; 32];
        entropy[..2].copy_from_slice(&seed.to_be_bytes());
        if wanted(throw_roll(player, monster, action_count, &entropy)) {
            return entropy;
        }
    }
    unreachable!("no entropy word produced the wanted parity");
}

#[test]
fn resolve_throw__even_roll_captures_at_any_action_count() {
    // given
    let player = entity(1);
    let monster = entity(2);

    for action_count in [1u64, 2, 3, 7] {
        let entropy = entropy_where(player, monster, action_count, |roll| roll % 2 == 0);

        // when
        let resolution = resolve_throw(player, monster, action_count, &entropy);

        // then
        assert_eq!(resolution, ThrowResolution::Caught);
    }
}

#[test]
fn resolve_throw__odd_roll_on_first_action_is_a_miss() {
    // given
    let player = entity(1);
    let monster = entity(2);
    let entropy = entropy_where(player, monster, 1, |roll| roll % 2 == 1);

    // when
    let resolution = resolve_throw(player, monster, 1, &entropy);

    // then
    assert_eq!(resolution, ThrowResolution::Miss);
}

#[test]
fn resolve_throw__odd_roll_past_the_second_action_escapes() {
    // given
    let player = entity(1);
    let monster = entity(2);
    let entropy = entropy_where(player, monster, 3, |roll| roll % 2 == 1);

    // when
    let resolution = resolve_throw(player, monster, 3, &entropy);

    // then
    assert_eq!(resolution, ThrowResolution::Escaped);
}

#[test]
fn resolve_throw__is_reproducible_for_identical_inputs() {
    // given
    let player = entity(1);
    let monster = entity(2);
    let entropy = [9u8; 32];

    // when
    let first = resolve_throw(player, monster, 2, &entropy);
    let second = resolve_throw(player, monster, 2, &entropy);

    // then
    assert_eq!(first, second);
}

#[test]
fn apply_attack__subtracts_attacker_strength() {
    // given
    let mut record = MonsterRecord::wild(10, 1);

    // when
    apply_attack(&mut record, 4);

    // then
    assert_eq!(record.health, 6);
}

#[test]
fn apply_attack__health_goes_negative_without_a_floor() {
    // given
    let mut record = MonsterRecord::wild(3, 1);

    // when
    apply_attack(&mut record, 5);

    // then
    assert_eq!(record.health, -2);
}

#[test]
fn should_start_encounter__is_deterministic_in_its_inputs() {
    let player = entity(1);
    let at = Position::new(4, 4);
    let entropy = [3u8; 32];
    assert_eq!(
        should_start_encounter(player, at, &entropy),
        should_start_encounter(player, at, &entropy),
    );
}

#[test]
fn begin__opens_with_a_single_action() {
    let encounter = EncounterState::begin(entity(1), entity(2));
    assert_eq!(encounter.action_count, 1);
    assert!(encounter.engages(entity(2)));
    assert!(!encounter.engages(entity(3)));
}
