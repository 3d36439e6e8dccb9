//! In-process authoritative ledger plus wiring helpers for tests. The
//! ledger executes submitted operations through the same pure rules the
//! client mirrors, with a settable entropy word so outcomes are chosen, not
//! sampled.

use crate::{
    actions::GameClient,
    config::ClientConfig,
    encounter::{
        self,
        EncounterState,
        MonsterRecord,
    },
    error::Error,
    events::LedgerEvent,
    executor::TxExecutor,
    ledger::{
        OperationSink,
        Signer,
        StateQuery,
        SubmitError,
    },
    overrides::OverrideManager,
    replica::ReplicaStore,
    sync::{
        self,
        ConfirmationHub,
        EventSource,
        StateSync,
    },
    types::{
        Address,
        ComponentKey,
        ComponentValue,
        EntityId,
        MapConfig,
        Operation,
        Position,
        Signature,
        SignedOperation,
        Terrain,
        TxHandle,
    },
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::mpsc;

pub const WILD_MONSTER_HEALTH: i64 = 10;
pub const WILD_MONSTER_STRENGTH: u64 = 1;
pub const PLAYER_STRENGTH: u64 = 2;

#[derive(Clone, Debug)]
pub struct TestSigner {
    address: Address,
}

impl TestSigner {
    pub fn new(tag: u8) -> Self {
        Self {
            address: Address([tag; 32]),
        }
    }
}

impl Signer for TestSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, digest: &[u8; 32]) -> Signature {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.address.0);
        bytes[32..].copy_from_slice(digest);
        Signature(bytes)
    }
}

struct LedgerInner {
    state: HashMap<(EntityId, ComponentKey), ComponentValue>,
    sequences: HashMap<Address, u64>,
    submission_log: Vec<u64>,
    entropy: [u8; 32],
    next_monster: u64,
    mute_confirmations: bool,
    paused: bool,
    buffered: Vec<LedgerEvent>,
    submit_faults: VecDeque<SubmitError>,
    subscribers: Vec<mpsc::UnboundedSender<LedgerEvent>>,
}

/// Deterministic stand-in for the remote ledger: strict per-signer
/// sequencing, authoritative execution of the shared rules, and an event
/// feed per subscriber.
#[derive(Clone)]
pub struct FakeLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl FakeLedger {
    pub fn new(map: MapConfig) -> Self {
        let mut state = HashMap::new();
        state.insert(
            (EntityId::MAP, ComponentKey::MapConfig),
            ComponentValue::MapConfig(map.clone()),
        );
        for y in 0..map.height as i32 {
            for x in 0..map.width as i32 {
                if map.terrain_at(Position::new(x, y)) == Terrain::Boulder {
                    let entity = obstruction_entity(x, y);
                    state.insert((entity, ComponentKey::Obstruction), ComponentValue::Obstruction);
                    state.insert(
                        (entity, ComponentKey::Position),
                        ComponentValue::Position(Position::new(x, y)),
                    );
                }
            }
        }
        Self {
            inner: Arc::new(Mutex::new(LedgerInner {
                state,
                sequences: HashMap::new(),
                submission_log: Vec::new(),
                entropy: [0u8; 32],
                next_monster: 0,
                mute_confirmations: false,
                paused: false,
                buffered: Vec::new(),
                submit_faults: VecDeque::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn subscribe_events(&self) -> FakeLedgerEvents {
        let (send, recv) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(send);
        FakeLedgerEvents { recv }
    }

    pub fn set_entropy(&self, entropy: [u8; 32]) {
        self.inner.lock().unwrap().entropy = entropy;
    }

    /// Simulates out-of-band operations consuming the signer's numbers.
    pub fn set_sequence(&self, signer: Address, next: u64) {
        self.inner.lock().unwrap().sequences.insert(signer, next);
    }

    pub fn fail_next_submission(&self, error: SubmitError) {
        self.inner.lock().unwrap().submit_faults.push_back(error);
    }

    /// Keep executing and emitting deltas, but never confirm.
    pub fn mute_confirmations(&self, muted: bool) {
        self.inner.lock().unwrap().mute_confirmations = muted;
    }

    /// Buffer all outgoing events until resumed; models a slow feed so tests
    /// can observe the client mid-flight.
    pub fn pause_events(&self, paused: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.paused = paused;
        if !paused {
            let backlog: Vec<_> = inner.buffered.drain(..).collect();
            for event in backlog {
                emit(&mut inner, event);
            }
        }
    }

    pub fn submission_log(&self) -> Vec<u64> {
        self.inner.lock().unwrap().submission_log.clone()
    }

    pub fn authoritative(&self, entity: EntityId, key: ComponentKey) -> Option<ComponentValue> {
        self.inner.lock().unwrap().state.get(&(entity, key)).cloned()
    }

    pub fn place_monster(&self, record: MonsterRecord) -> EntityId {
        let mut inner = self.inner.lock().unwrap();
        let monster = allocate_monster(&mut inner);
        set_component(&mut inner, monster, ComponentValue::Monster(record));
        monster
    }

    pub fn begin_encounter(&self, player: EntityId, monster: EntityId) {
        let mut inner = self.inner.lock().unwrap();
        set_component(
            &mut inner,
            player,
            ComponentValue::Encounter(EncounterState::begin(player, monster)),
        );
    }
}

impl OperationSink for FakeLedger {
    async fn submit(&self, operation: SignedOperation) -> Result<TxHandle, SubmitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.submission_log.push(operation.sequence);
        if let Some(fault) = inner.submit_faults.pop_front() {
            return Err(fault);
        }
        let expected = inner.sequences.get(&operation.signer).copied().unwrap_or(0);
        // Reusing a consumed number conflicts; gaps are accepted.
        if operation.sequence < expected {
            return Err(SubmitError::SequenceConflict { expected });
        }
        inner
            .sequences
            .insert(operation.signer, operation.sequence + 1);
        execute(&mut inner, operation.signer.into(), &operation.payload)?;
        let handle = operation.handle();
        if !inner.mute_confirmations {
            emit(&mut inner, LedgerEvent::confirmed(handle));
        }
        Ok(handle)
    }

    async fn sequence_hint(&self, signer: Address) -> Result<u64, SubmitError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sequences
            .get(&signer)
            .copied()
            .unwrap_or(0))
    }
}

impl StateQuery for FakeLedger {
    async fn components(&self) -> crate::Result<Vec<(EntityId, ComponentValue)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .state
            .iter()
            .map(|((entity, _), value)| (*entity, value.clone()))
            .collect())
    }
}

pub struct FakeLedgerEvents {
    recv: mpsc::UnboundedReceiver<LedgerEvent>,
}

impl EventSource for FakeLedgerEvents {
    async fn next_event(&mut self) -> crate::Result<LedgerEvent> {
        self.recv.recv().await.ok_or(Error::EventStreamClosed)
    }
}

fn emit(inner: &mut LedgerInner, event: LedgerEvent) {
    if inner.paused {
        inner.buffered.push(event);
        return;
    }
    inner
        .subscribers
        .retain(|sender| sender.send(event.clone()).is_ok());
}

fn set_component(inner: &mut LedgerInner, entity: EntityId, value: ComponentValue) {
    inner.state.insert((entity, value.key()), value.clone());
    emit(inner, LedgerEvent::set(entity, value));
}

fn unset_component(inner: &mut LedgerInner, entity: EntityId, key: ComponentKey) {
    inner.state.remove(&(entity, key));
    emit(inner, LedgerEvent::unset(entity, key));
}

fn map_of(inner: &LedgerInner) -> Result<MapConfig, SubmitError> {
    inner
        .state
        .get(&(EntityId::MAP, ComponentKey::MapConfig))
        .and_then(|value| value.as_map_config().cloned())
        .ok_or_else(|| SubmitError::Rejected("map not initialized".into()))
}

fn obstructed(inner: &LedgerInner, at: Position) -> bool {
    inner.state.iter().any(|((entity, key), _)| {
        *key == ComponentKey::Obstruction
            && inner
                .state
                .get(&(*entity, ComponentKey::Position))
                .and_then(|value| value.as_position())
                == Some(at)
    })
}

fn allocate_monster(inner: &mut LedgerInner) -> EntityId {
    inner.next_monster += 1;
    let mut bytes = [0u8; 32];
    bytes[0] = 0xE0;
    bytes[24..].copy_from_slice(&inner.next_monster.to_be_bytes());
    EntityId(bytes)
}

fn obstruction_entity(x: i32, y: i32) -> EntityId {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xB0;
    bytes[16..20].copy_from_slice(&x.to_be_bytes());
    bytes[20..24].copy_from_slice(&y.to_be_bytes());
    EntityId(bytes)
}

fn execute(
    inner: &mut LedgerInner,
    player: EntityId,
    operation: &Operation,
) -> Result<(), SubmitError> {
    match operation {
        Operation::Spawn { at } => {
            if inner.state.contains_key(&(player, ComponentKey::Player)) {
                return Err(SubmitError::Rejected("player already spawned".into()));
            }
            let map = map_of(inner)?;
            let at = map.wrap(*at);
            if obstructed(inner, at) {
                return Err(SubmitError::Rejected("cell obstructed".into()));
            }
            set_component(inner, player, ComponentValue::Player);
            set_component(inner, player, ComponentValue::Position(at));
            set_component(inner, player, ComponentValue::Strength(PLAYER_STRENGTH));
        }
        Operation::Move { to } => {
            if !inner.state.contains_key(&(player, ComponentKey::Player)) {
                return Err(SubmitError::Rejected("player not spawned".into()));
            }
            if inner.state.contains_key(&(player, ComponentKey::Encounter)) {
                return Err(SubmitError::Rejected("cannot move while engaged".into()));
            }
            let map = map_of(inner)?;
            let to = map.wrap(*to);
            if obstructed(inner, to) {
                return Err(SubmitError::Rejected("cell obstructed".into()));
            }
            set_component(inner, player, ComponentValue::Position(to));
            if map.terrain_at(to) == Terrain::Grass
                && encounter::should_start_encounter(player, to, &inner.entropy)
            {
                let monster = allocate_monster(inner);
                set_component(
                    inner,
                    monster,
                    ComponentValue::Monster(MonsterRecord::wild(
                        WILD_MONSTER_HEALTH,
                        WILD_MONSTER_STRENGTH,
                    )),
                );
                set_component(
                    inner,
                    player,
                    ComponentValue::Encounter(EncounterState::begin(player, monster)),
                );
            }
        }
        Operation::Throw { monster } => {
            let Some(ComponentValue::Encounter(current)) = inner
                .state
                .get(&(player, ComponentKey::Encounter))
                .cloned()
            else {
                return Err(SubmitError::Rejected("not in an encounter".into()));
            };
            if !current.engages(*monster) {
                return Err(SubmitError::Rejected("monster not engaged".into()));
            }
            match encounter::resolve_throw(player, *monster, current.action_count, &inner.entropy)
            {
                encounter::ThrowResolution::Caught => {
                    let Some(ComponentValue::Monster(mut record)) =
                        inner.state.get(&(*monster, ComponentKey::Monster)).cloned()
                    else {
                        return Err(SubmitError::Rejected("monster record missing".into()));
                    };
                    record.owner = Some(player);
                    set_component(inner, *monster, ComponentValue::Monster(record));
                    unset_component(inner, player, ComponentKey::Encounter);
                }
                encounter::ThrowResolution::Escaped => {
                    unset_component(inner, *monster, ComponentKey::Monster);
                    unset_component(inner, player, ComponentKey::Encounter);
                }
                encounter::ThrowResolution::Miss => {
                    let mut advanced = current;
                    advanced.action_count += 1;
                    set_component(inner, player, ComponentValue::Encounter(advanced));
                }
            }
        }
        Operation::Attack { monster } => {
            let Some(ComponentValue::Encounter(current)) = inner
                .state
                .get(&(player, ComponentKey::Encounter))
                .cloned()
            else {
                return Err(SubmitError::Rejected("not in an encounter".into()));
            };
            if !current.engages(*monster) {
                return Err(SubmitError::Rejected("monster not engaged".into()));
            }
            let strength = inner
                .state
                .get(&(player, ComponentKey::Strength))
                .and_then(|value| value.as_strength())
                .unwrap_or(0);
            let Some(ComponentValue::Monster(mut record)) =
                inner.state.get(&(*monster, ComponentKey::Monster)).cloned()
            else {
                return Err(SubmitError::Rejected("monster record missing".into()));
            };
            encounter::apply_attack(&mut record, strength);
            set_component(inner, *monster, ComponentValue::Monster(record));
        }
        Operation::Flee => {
            // fleeing with no encounter is a harmless no-op
            if inner.state.contains_key(&(player, ComponentKey::Encounter)) {
                unset_component(inner, player, ComponentKey::Encounter);
            }
        }
    }
    Ok(())
}

/// Search the entropy space for a word satisfying the predicate, so tests
/// choose outcomes instead of hardcoding magic constants.
pub fn find_entropy(predicate: impl Fn(&[u8; 32]) -> bool) -> [u8; 32] {
    for seed in 0u32..1_000_000 {
        let mut entropy = [0u8; 32];
        entropy[..4].copy_from_slice(&seed.to_be_bytes());
        if predicate(&entropy) {
            return entropy;
        }
    }
    panic!("no entropy word satisfied the predicate");
}

pub struct TestContext {
    pub ledger: FakeLedger,
    pub config: ClientConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ClientConfig {
            retry_count: 3,
            confirmation_timeout_ms: 2_000,
            event_buffer: 64,
        })
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            ledger: FakeLedger::new(Self::default_map()),
            config,
        }
    }

    /// 8x6 torus with a grass column at x = 5 and one boulder at (3, 2).
    pub fn default_map() -> MapConfig {
        let mut map = MapConfig::open(8, 6);
        for y in 0..6 {
            map.terrain[y * 8 + 5] = Terrain::Grass;
        }
        map.terrain[2 * 8 + 3] = Terrain::Boulder;
        map
    }

    /// Wire up a full client for one signer: seeded replica, event pump, and
    /// executor against the shared fake ledger.
    pub async fn player(&self, tag: u8) -> PlayerHarness {
        let signer = TestSigner::new(tag);
        let address = signer.address();
        let entity: EntityId = address.into();

        let replica = ReplicaStore::new();
        sync::seed_replica(&replica, &self.ledger).await.unwrap();
        let overrides = OverrideManager::new(replica.clone());
        let hub = ConfirmationHub::new(self.config.event_buffer);
        let pump = StateSync::new(self.ledger.subscribe_events(), replica.clone(), hub.clone());
        let pump_task = tokio::spawn(pump.run());

        let executor = TxExecutor::new(signer, self.ledger.clone());
        let client = Arc::new(GameClient::new(
            replica.clone(),
            overrides.clone(),
            executor,
            hub,
            self.config.clone(),
        ));

        PlayerHarness {
            entity,
            address,
            client,
            replica,
            overrides,
            _pump: pump_task,
        }
    }

    /// A signer-less client: reads work, mutating verbs are rejected.
    pub async fn read_only(&self) -> Arc<GameClient<TestSigner, FakeLedger>> {
        let replica = ReplicaStore::new();
        sync::seed_replica(&replica, &self.ledger).await.unwrap();
        let overrides = OverrideManager::new(replica.clone());
        let hub = ConfirmationHub::new(self.config.event_buffer);
        let executor = TxExecutor::read_only(self.ledger.clone());
        Arc::new(GameClient::new(
            replica,
            overrides,
            executor,
            hub,
            self.config.clone(),
        ))
    }
}

pub struct PlayerHarness {
    pub entity: EntityId,
    pub address: Address,
    pub client: Arc<GameClient<TestSigner, FakeLedger>>,
    pub replica: ReplicaStore,
    pub overrides: OverrideManager,
    _pump: tokio::task::JoinHandle<crate::Result<()>>,
}
