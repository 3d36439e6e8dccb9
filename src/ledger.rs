//! Boundary contracts toward the remote ledger. Transport, endpoint
//! discovery, and key storage live behind these traits; the core never sees
//! wire bytes.

use crate::types::{
    Address,
    ComponentValue,
    EntityId,
    Signature,
    SignedOperation,
    TxHandle,
};
use std::future::Future;

/// Submission-level failure, classified so the executor knows whether a
/// resubmission with a fresh sequence number can help.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("sequence conflict, ledger expects {expected}")]
    SequenceConflict { expected: u64 },

    #[error("transient transport failure: {0}")]
    Transport(String),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::SequenceConflict { .. } | SubmitError::Transport(_)
        )
    }
}

/// Signing capability. Its absence is a valid state: the client then serves
/// reads only and rejects mutating actions.
pub trait Signer {
    fn address(&self) -> Address;
    fn sign(&self, digest: &[u8; 32]) -> Signature;
}

/// The ledger's submission endpoint.
pub trait OperationSink {
    fn submit(
        &self,
        operation: SignedOperation,
    ) -> impl Future<Output = Result<TxHandle, SubmitError>> + Send;

    /// Current sequence number for a signer. Queried once to seed the
    /// executor's cached counter; never re-queried afterwards.
    fn sequence_hint(
        &self,
        signer: Address,
    ) -> impl Future<Output = Result<u64, SubmitError>> + Send;
}

/// Point-in-time read of authoritative component state, used to seed the
/// replica before the event feed takes over.
pub trait StateQuery {
    fn components(
        &self,
    ) -> impl Future<Output = crate::Result<Vec<(EntityId, ComponentValue)>>> + Send;
}
