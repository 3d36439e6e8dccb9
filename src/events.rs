use crate::types::{
    ComponentKey,
    ComponentValue,
    EntityId,
    TxHandle,
};
use serde::{
    Deserialize,
    Serialize,
};

/// One notification from the ledger's event feed: either a finalized
/// submission or a change to authoritative component state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Confirmed(Confirmation),
    Delta(StateDelta),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub handle: TxHandle,
}

/// `value: None` means the component was deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub entity: EntityId,
    pub key: ComponentKey,
    pub value: Option<ComponentValue>,
}

impl LedgerEvent {
    pub fn confirmed(handle: TxHandle) -> Self {
        LedgerEvent::Confirmed(Confirmation { handle })
    }

    pub fn set(entity: EntityId, value: ComponentValue) -> Self {
        LedgerEvent::Delta(StateDelta {
            entity,
            key: value.key(),
            value: Some(value),
        })
    }

    pub fn unset(entity: EntityId, key: ComponentKey) -> Self {
        LedgerEvent::Delta(StateDelta {
            entity,
            key,
            value: None,
        })
    }
}
