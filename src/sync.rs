use crate::{
    error::Error,
    events::LedgerEvent,
    ledger::StateQuery,
    replica::ReplicaStore,
    types::TxHandle,
};
use std::future::Future;
use tokio::sync::broadcast;


/// The ledger's notification feed: confirmations and authoritative
/// component-value changes, in emission order.
pub trait EventSource {
    fn next_event(&mut self) -> impl Future<Output = crate::Result<LedgerEvent>> + Send;
}

/// Process-wide fan-out of confirmed-operation notifications. The channel is
/// bounded; a lagging subscriber drops the oldest notifications and resumes,
/// the producer never blocks.
#[derive(Clone)]
pub struct ConfirmationHub {
    sender: broadcast::Sender<TxHandle>,
}

impl ConfirmationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe before submitting: emissions prior to subscription are
    /// never replayed.
    pub fn subscribe(&self) -> ConfirmationListener {
        ConfirmationListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn publish(&self, handle: TxHandle) {
        // no subscribers is fine
        let _ = self.sender.send(handle);
    }
}

pub struct ConfirmationListener {
    receiver: broadcast::Receiver<TxHandle>,
}

impl ConfirmationListener {
    /// Resolves the first time the feed emits the matching handle. Never
    /// resolves for a handle the ledger does not confirm; deadlines are the
    /// caller's responsibility.
    pub async fn wait_for(mut self, handle: TxHandle) -> crate::Result<()> {
        loop {
            match self.receiver.recv().await {
                Ok(seen) if seen == handle => return Ok(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "confirmation listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::EventStreamClosed);
                }
            }
        }
    }
}

/// Pumps the ledger event feed: deltas into the replica, confirmations onto
/// the hub. The one writer of authoritative values.
pub struct StateSync<E> {
    events: E,
    replica: ReplicaStore,
    confirmations: ConfirmationHub,
}

impl<E: EventSource> StateSync<E> {
    pub fn new(events: E, replica: ReplicaStore, confirmations: ConfirmationHub) -> Self {
        Self {
            events,
            replica,
            confirmations,
        }
    }

    pub async fn step(&mut self) -> crate::Result<()> {
        match self.events.next_event().await? {
            LedgerEvent::Confirmed(confirmation) => {
                tracing::debug!(handle = %confirmation.handle, "operation confirmed");
                self.confirmations.publish(confirmation.handle);
            }
            LedgerEvent::Delta(delta) => {
                let entity = delta.entity;
                let key = delta.key;
                let changed = self.replica.apply(entity, key, delta.value);
                tracing::trace!(%entity, ?key, changed, "applied delta");
            }
        }
        Ok(())
    }

    pub async fn run(mut self) -> crate::Result<()> {
        loop {
            self.step().await?;
        }
    }
}

/// Seed the replica from a point-in-time authoritative read. Run this before
/// the pump so reads have a floor to fall through to.
pub async fn seed_replica<Q: StateQuery>(
    replica: &ReplicaStore,
    query: &Q,
) -> crate::Result<()> {
    let components = query.components().await?;
    tracing::debug!(count = components.len(), "seeded replica");
    replica.seed(components);
    Ok(())
}
