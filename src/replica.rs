use crate::types::{
    ComponentKey,
    ComponentValue,
    EntityId,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

/// Last-known-authoritative component values, keyed by entity. Written only
/// by the reconciliation path; the override layer reads through it.
#[derive(Clone, Default)]
pub struct ReplicaStore {
    inner: Arc<Mutex<HashMap<(EntityId, ComponentKey), ComponentValue>>>,
}

impl ReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: EntityId, key: ComponentKey) -> Option<ComponentValue> {
        let guard = self.inner.lock().unwrap();
        guard.get(&(entity, key)).cloned()
    }

    /// Apply one authoritative delta. `None` deletes the component.
    /// Re-applying the current value is a no-op; returns whether anything
    /// changed.
    pub fn apply(
        &self,
        entity: EntityId,
        key: ComponentKey,
        value: Option<ComponentValue>,
    ) -> bool {
        let mut guard = self.inner.lock().unwrap();
        match value {
            Some(value) => {
                let slot = guard.entry((entity, key));
                match slot {
                    std::collections::hash_map::Entry::Occupied(mut occupied) => {
                        if occupied.get() == &value {
                            false
                        } else {
                            occupied.insert(value);
                            true
                        }
                    }
                    std::collections::hash_map::Entry::Vacant(vacant) => {
                        vacant.insert(value);
                        true
                    }
                }
            }
            None => guard.remove(&(entity, key)).is_some(),
        }
    }

    /// Seed the store from a point-in-time authoritative read.
    pub fn seed(&self, components: impl IntoIterator<Item = (EntityId, ComponentValue)>) {
        let mut guard = self.inner.lock().unwrap();
        for (entity, value) in components {
            guard.insert((entity, value.key()), value);
        }
    }

    /// All entities currently carrying the given component.
    pub fn entities_with(&self, key: ComponentKey) -> Vec<(EntityId, ComponentValue)> {
        let guard = self.inner.lock().unwrap();
        guard
            .iter()
            .filter(|((_, k), _)| *k == key)
            .map(|((entity, _), value)| (*entity, value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
