use crate::{
    ledger::SubmitError,
    types::{
        EntityId,
        Position,
        TxHandle,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no signer bound; client is read-only")]
    NoSigner,

    #[error("player is not spawned")]
    NotSpawned,

    #[error("player is already spawned")]
    AlreadySpawned,

    #[error("not in an encounter")]
    NotInEncounter,

    #[error("monster {0} is not part of the current encounter")]
    MonsterNotEngaged(EntityId),

    #[error("cannot move while engaged in an encounter")]
    EngagedInEncounter,

    #[error("cell ({x}, {y}) is obstructed", x = .0.x, y = .0.y)]
    Obstructed(Position),

    #[error("map configuration has not been observed yet")]
    MapUnavailable,

    #[error("submission failed after {attempts} attempt(s)")]
    ExecutionFailed {
        attempts: u32,
        #[source]
        source: SubmitError,
    },

    #[error("confirmation for {0} not observed within the deadline")]
    ConfirmationTimeout(TxHandle),

    #[error("ledger event stream closed")]
    EventStreamClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
