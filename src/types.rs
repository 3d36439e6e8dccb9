use crate::encounter::{
    EncounterState,
    MonsterRecord,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::fmt;

/// Opaque stable identifier joining components together. Player entities use
/// their signer address bytes; everything else is assigned by the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub [u8; 32]);

impl EntityId {
    /// The well-known entity carrying the map configuration component.
    pub const MAP: EntityId = EntityId([0xFF; 32]);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl From<Address> for EntityId {
    fn from(address: Address) -> Self {
        EntityId(address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Open,
    Grass,
    Boulder,
}

/// Authoritative map layout, stored as a component of [`EntityId::MAP`].
/// Terrain is row-major with length `width * height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    pub terrain: Vec<Terrain>,
}

impl MapConfig {
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            terrain: vec![Terrain::Open; (width * height) as usize],
        }
    }

    /// Wrap a coordinate into the toroidal map space. Both the client and the
    /// ledger run this, so the two must stay in lockstep.
    pub fn wrap(&self, position: Position) -> Position {
        Position {
            x: position.x.rem_euclid(self.width as i32),
            y: position.y.rem_euclid(self.height as i32),
        }
    }

    pub fn terrain_at(&self, position: Position) -> Terrain {
        let wrapped = self.wrap(position);
        let index = wrapped.y as usize * self.width as usize + wrapped.x as usize;
        self.terrain.get(index).copied().unwrap_or(Terrain::Open)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKey {
    Position,
    Player,
    Strength,
    Monster,
    Encounter,
    Obstruction,
    MapConfig,
}

/// Tagged component value. The variant determines which [`ComponentKey`] the
/// value lives under, so a caller can never file a position under `Monster`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentValue {
    Position(Position),
    Player,
    Strength(u64),
    Monster(MonsterRecord),
    Encounter(EncounterState),
    Obstruction,
    MapConfig(MapConfig),
}

impl ComponentValue {
    pub fn key(&self) -> ComponentKey {
        match self {
            ComponentValue::Position(_) => ComponentKey::Position,
            ComponentValue::Player => ComponentKey::Player,
            ComponentValue::Strength(_) => ComponentKey::Strength,
            ComponentValue::Monster(_) => ComponentKey::Monster,
            ComponentValue::Encounter(_) => ComponentKey::Encounter,
            ComponentValue::Obstruction => ComponentKey::Obstruction,
            ComponentValue::MapConfig(_) => ComponentKey::MapConfig,
        }
    }

    pub fn as_position(&self) -> Option<Position> {
        match self {
            ComponentValue::Position(position) => Some(*position),
            _ => None,
        }
    }

    pub fn as_strength(&self) -> Option<u64> {
        match self {
            ComponentValue::Strength(strength) => Some(*strength),
            _ => None,
        }
    }

    pub fn as_monster(&self) -> Option<&MonsterRecord> {
        match self {
            ComponentValue::Monster(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_encounter(&self) -> Option<&EncounterState> {
        match self {
            ComponentValue::Encounter(encounter) => Some(encounter),
            _ => None,
        }
    }

    pub fn as_map_config(&self) -> Option<&MapConfig> {
        match self {
            ComponentValue::MapConfig(map) => Some(map),
            _ => None,
        }
    }
}

/// One user intent, as submitted to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Spawn { at: Position },
    Move { to: Position },
    Throw { monster: EntityId },
    Attack { monster: EntityId },
    Flee,
}

impl Operation {
    /// Content digest used as the signing payload. Covers the signer and the
    /// sequence number so a resubmission signs fresh bytes.
    pub fn digest(&self, signer: Address, sequence: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(signer.0);
        hasher.update(sequence.to_be_bytes());
        let payload =
            serde_json::to_vec(self).expect("operation serialization is infallible");
        hasher.update(&payload);
        hasher.finalize().into()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedOperation {
    pub payload: Operation,
    pub sequence: u64,
    pub signer: Address,
    pub digest: [u8; 32],
    pub signature: Signature,
}

impl SignedOperation {
    /// Handle correlating this submission with its eventual confirmation.
    pub fn handle(&self) -> TxHandle {
        let mut hasher = Sha256::new();
        hasher.update(self.signer.0);
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(self.digest);
        TxHandle(hasher.finalize().into())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub [u8; 32]);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
