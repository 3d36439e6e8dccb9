use crate::{
    replica::ReplicaStore,
    types::{
        ComponentKey,
        ComponentValue,
        EntityId,
    },
};
use std::sync::{
    Arc,
    Mutex,
    atomic::{
        AtomicU64,
        Ordering,
    },
};


#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverrideId(u64);

#[derive(Clone, Debug)]
struct OverrideEntry {
    id: OverrideId,
    entity: EntityId,
    key: ComponentKey,
    value: ComponentValue,
}

/// Speculative patches layered over the replica. Reads see the most recently
/// added live override for an `(entity, component)` pair, falling through to
/// the authoritative value when none is live.
#[derive(Clone)]
pub struct OverrideManager {
    entries: Arc<Mutex<Vec<OverrideEntry>>>,
    next_id: Arc<AtomicU64>,
    replica: ReplicaStore,
}

impl OverrideManager {
    pub fn new(replica: ReplicaStore) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            replica,
        }
    }

    pub fn add(&self, entity: EntityId, value: ComponentValue) -> OverrideId {
        let id = OverrideId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = OverrideEntry {
            id,
            entity,
            key: value.key(),
            value,
        };
        let mut guard = self.entries.lock().unwrap();
        guard.push(entry);
        id
    }

    /// Removing an id that is no longer (or never was) present is a no-op.
    pub fn remove(&self, id: OverrideId) {
        let mut guard = self.entries.lock().unwrap();
        guard.retain(|entry| entry.id != id);
    }

    /// Effective read: latest live override wins, else the replica value.
    pub fn read(&self, entity: EntityId, key: ComponentKey) -> Option<ComponentValue> {
        let guard = self.entries.lock().unwrap();
        let overridden = guard
            .iter()
            .rev()
            .find(|entry| entry.entity == entity && entry.key == key)
            .map(|entry| entry.value.clone());
        drop(guard);
        overridden.or_else(|| self.replica.get(entity, key))
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// A scope that owns the overrides one action creates. Dropping the guard
    /// releases them, so every exit path of the action releases.
    pub fn guard(&self) -> OverrideGuard {
        OverrideGuard {
            manager: self.clone(),
            ids: Vec::new(),
        }
    }
}

pub struct OverrideGuard {
    manager: OverrideManager,
    ids: Vec<OverrideId>,
}

impl OverrideGuard {
    pub fn add(&mut self, entity: EntityId, value: ComponentValue) -> OverrideId {
        let id = self.manager.add(entity, value);
        self.ids.push(id);
        id
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.manager.remove(id);
        }
        tracing::trace!("released action overrides");
    }
}
