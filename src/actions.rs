use crate::{
    config::ClientConfig,
    encounter::{
        EncounterState,
        MonsterRecord,
    },
    error::Error,
    executor::TxExecutor,
    ledger::{
        OperationSink,
        Signer,
    },
    overrides::OverrideManager,
    replica::ReplicaStore,
    sync::ConfirmationHub,
    types::{
        ComponentKey,
        ComponentValue,
        EntityId,
        MapConfig,
        Operation,
        Position,
        TxHandle,
    },
};
use std::fmt;
use tokio::time::timeout;

/// Outcome of a throw, derived from post-confirmation authoritative state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThrowOutcome {
    Caught,
    Fled,
    Miss,
}

impl fmt::Display for ThrowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThrowOutcome::Caught => "caught",
            ThrowOutcome::Fled => "fled",
            ThrowOutcome::Miss => "miss",
        };
        write!(f, "{label}")
    }
}

/// The user-facing verb set. Every verb follows the same shape: validate
/// against the effective view, lay down overrides for instant feedback,
/// submit, await confirmation, release the overrides on every path, then
/// classify the result from authoritative state.
pub struct GameClient<K, S> {
    replica: ReplicaStore,
    overrides: OverrideManager,
    executor: TxExecutor<K, S>,
    confirmations: ConfirmationHub,
    config: ClientConfig,
}

impl<K: Signer, S: OperationSink> GameClient<K, S> {
    pub fn new(
        replica: ReplicaStore,
        overrides: OverrideManager,
        executor: TxExecutor<K, S>,
        confirmations: ConfirmationHub,
        config: ClientConfig,
    ) -> Self {
        Self {
            replica,
            overrides,
            executor,
            confirmations,
            config,
        }
    }

    /// The signer's player entity; absent in read-only sessions.
    pub fn player_entity(&self) -> crate::Result<EntityId> {
        self.executor
            .signer_address()
            .map(Into::into)
            .ok_or(Error::NoSigner)
    }

    /// Override-aware read, for presentation collaborators.
    pub fn effective(&self, entity: EntityId, key: ComponentKey) -> Option<ComponentValue> {
        self.overrides.read(entity, key)
    }

    pub fn position_of(&self, entity: EntityId) -> Option<Position> {
        self.effective(entity, ComponentKey::Position)?.as_position()
    }

    pub fn encounter_of(&self, entity: EntityId) -> Option<EncounterState> {
        self.effective(entity, ComponentKey::Encounter)?
            .as_encounter()
            .cloned()
    }

    pub fn monster_of(&self, entity: EntityId) -> Option<MonsterRecord> {
        self.effective(entity, ComponentKey::Monster)?
            .as_monster()
            .cloned()
    }

    pub fn map_config(&self) -> crate::Result<MapConfig> {
        self.effective(EntityId::MAP, ComponentKey::MapConfig)
            .and_then(|value| value.as_map_config().cloned())
            .ok_or(Error::MapUnavailable)
    }

    fn is_spawned(&self, player: EntityId) -> bool {
        self.effective(player, ComponentKey::Player).is_some()
    }

    fn is_obstructed(&self, at: Position) -> bool {
        self.replica
            .entities_with(ComponentKey::Obstruction)
            .into_iter()
            .any(|(entity, _)| {
                self.effective(entity, ComponentKey::Position)
                    .and_then(|value| value.as_position())
                    == Some(at)
            })
    }

    /// Subscribes before submitting so the confirmation cannot slip past,
    /// then waits under the configured deadline.
    async fn submit_and_confirm(&self, operation: Operation) -> crate::Result<TxHandle> {
        let listener = self.confirmations.subscribe();
        let handle = self
            .executor
            .execute(operation, self.config.retry_count)
            .await?;
        match timeout(self.config.confirmation_timeout(), listener.wait_for(handle)).await {
            Ok(waited) => waited.map(|_| handle),
            Err(_) => Err(Error::ConfirmationTimeout(handle)),
        }
    }

    pub async fn spawn(&self, at: Position) -> crate::Result<()> {
        let player = self.player_entity()?;
        if self.is_spawned(player) {
            return Err(Error::AlreadySpawned);
        }
        let map = self.map_config()?;
        let at = map.wrap(at);
        if self.is_obstructed(at) {
            return Err(Error::Obstructed(at));
        }

        let mut speculative = self.overrides.guard();
        speculative.add(player, ComponentValue::Player);
        speculative.add(player, ComponentValue::Position(at));

        let result = self.submit_and_confirm(Operation::Spawn { at }).await;
        drop(speculative);
        let handle = result?;
        tracing::info!(%player, %handle, ?at, "spawned");
        Ok(())
    }

    pub async fn move_to(&self, to: Position) -> crate::Result<()> {
        let player = self.player_entity()?;
        if !self.is_spawned(player) {
            return Err(Error::NotSpawned);
        }
        if self.encounter_of(player).is_some() {
            return Err(Error::EngagedInEncounter);
        }
        let map = self.map_config()?;
        let to = map.wrap(to);
        if self.is_obstructed(to) {
            return Err(Error::Obstructed(to));
        }

        let mut speculative = self.overrides.guard();
        speculative.add(player, ComponentValue::Position(to));

        let result = self.submit_and_confirm(Operation::Move { to }).await;
        drop(speculative);
        result.map(|_| ())
    }

    pub async fn move_by(&self, dx: i32, dy: i32) -> crate::Result<()> {
        let player = self.player_entity()?;
        let current = self.position_of(player).ok_or(Error::NotSpawned)?;
        self.move_to(Position::new(current.x + dx, current.y + dy))
            .await
    }

    pub async fn throw_ball(&self, monster: EntityId) -> crate::Result<ThrowOutcome> {
        let player = self.player_entity()?;
        let encounter = self
            .encounter_of(player)
            .filter(|encounter| encounter.action_count != 0)
            .ok_or(Error::NotInEncounter)?;
        if !encounter.engages(monster) {
            return Err(Error::MonsterNotEngaged(monster));
        }

        // The roll is never predicted locally; no override to lay down.
        self.submit_and_confirm(Operation::Throw { monster }).await?;

        let outcome = match self.replica.get(monster, ComponentKey::Monster) {
            Some(ComponentValue::Monster(record)) if record.owner == Some(player) => {
                ThrowOutcome::Caught
            }
            None => ThrowOutcome::Fled,
            Some(_) => ThrowOutcome::Miss,
        };
        tracing::info!(%monster, %outcome, "throw resolved");
        Ok(outcome)
    }

    pub async fn attack(&self, monster: EntityId) -> crate::Result<()> {
        let player = self.player_entity()?;
        let encounter = self.encounter_of(player).ok_or(Error::NotInEncounter)?;
        if !encounter.engages(monster) {
            return Err(Error::MonsterNotEngaged(monster));
        }
        self.submit_and_confirm(Operation::Attack { monster })
            .await
            .map(|_| ())
    }

    /// Fleeing a non-existent encounter is a harmless no-op, so there is
    /// nothing to validate.
    pub async fn flee(&self) -> crate::Result<()> {
        self.submit_and_confirm(Operation::Flee).await.map(|_| ())
    }
}
