use crate::{
    error::Error,
    ledger::{
        OperationSink,
        Signer,
    },
    types::{
        Address,
        Operation,
        SignedOperation,
        TxHandle,
    },
};
use tokio::sync::Mutex;


#[derive(Default)]
struct SequenceState {
    /// Next sequence number to use. `None` until seeded from the ledger;
    /// afterwards the counter is advanced locally and never re-queried.
    next: Option<u64>,
}

/// Owns the signer's sequence counter and serializes submissions: a second
/// `execute` does not begin constructing until the first has a definitive
/// submission outcome.
pub struct TxExecutor<K, S> {
    signer: Option<K>,
    sink: S,
    sequence: Mutex<SequenceState>,
}

impl<K, S> TxExecutor<K, S> {
    pub fn new(signer: K, sink: S) -> Self {
        Self {
            signer: Some(signer),
            sink,
            sequence: Mutex::new(SequenceState::default()),
        }
    }

    /// A sink-only executor for read-only sessions; every `execute` fails
    /// with [`Error::NoSigner`].
    pub fn read_only(sink: S) -> Self {
        Self {
            signer: None,
            sink,
            sequence: Mutex::new(SequenceState::default()),
        }
    }
}

impl<K: Signer, S: OperationSink> TxExecutor<K, S> {
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    /// Sign and submit one operation, resubmitting with an advanced sequence
    /// number on retryable failure, up to `retry_count` attempts in total.
    /// Attempted sequence numbers are consumed permanently, even when the
    /// operation ultimately fails.
    pub async fn execute(
        &self,
        operation: Operation,
        retry_count: u32,
    ) -> crate::Result<TxHandle> {
        let signer = self.signer.as_ref().ok_or(Error::NoSigner)?;

        // Held across the whole submission round-trip: same-signer
        // operations serialize here.
        let mut state = self.sequence.lock().await;
        let mut sequence = match state.next {
            Some(next) => next,
            None => self
                .sink
                .sequence_hint(signer.address())
                .await
                .map_err(|source| Error::ExecutionFailed {
                    attempts: 0,
                    source,
                })?,
        };

        let attempts_allowed = retry_count.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let digest = operation.digest(signer.address(), sequence);
            let signed = SignedOperation {
                payload: operation.clone(),
                sequence,
                signer: signer.address(),
                digest,
                signature: signer.sign(&digest),
            };
            tracing::debug!(sequence, attempt, "submitting operation");
            match self.sink.submit(signed).await {
                Ok(handle) => {
                    state.next = Some(sequence + 1);
                    tracing::debug!(%handle, "submission accepted");
                    return Ok(handle);
                }
                Err(cause) if cause.is_retryable() && attempt < attempts_allowed => {
                    tracing::warn!(
                        sequence,
                        attempt,
                        error = %cause,
                        "retryable submission failure, advancing sequence"
                    );
                    sequence += 1;
                }
                Err(cause) => {
                    // The attempted number is consumed either way.
                    state.next = Some(sequence + 1);
                    return Err(Error::ExecutionFailed {
                        attempts: attempt,
                        source: cause,
                    });
                }
            }
        }
    }
}
