//! The turn-based encounter rules. Everything here is a pure function of
//! authoritative state plus a block-entropy word, so the ledger's execution
//! and the client's mirror resolve bit-for-bit identically.

use crate::types::{
    EntityId,
    Position,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

#[cfg(test)]
mod tests;

/// A live encounter, stored as a component of the player entity. The
/// component's absence *is* the not-in-encounter state; an existing
/// encounter always has `action_count >= 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterState {
    pub player: EntityId,
    pub action_count: u64,
    pub monsters: Vec<EntityId>,
}

impl EncounterState {
    pub fn begin(player: EntityId, monster: EntityId) -> Self {
        Self {
            player,
            action_count: 1,
            monsters: vec![monster],
        }
    }

    pub fn engages(&self, monster: EntityId) -> bool {
        self.monsters.contains(&monster)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub health: i64,
    pub strength: u64,
    pub owner: Option<EntityId>,
}

impl MonsterRecord {
    pub fn wild(health: i64, strength: u64) -> Self {
        Self {
            health,
            strength,
            owner: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThrowResolution {
    /// Even roll: the monster becomes owned by the thrower and the
    /// encounter ends.
    Caught,
    /// Odd roll after more than two actions: the monster is gone for good.
    Escaped,
    /// Odd roll early in the encounter: the action counter advances.
    Miss,
}

/// Deterministic roll for a throw, derived from the participants, the
/// encounter's action counter, and the block-entropy word.
pub fn throw_roll(
    player: EntityId,
    monster: EntityId,
    action_count: u64,
    entropy: &[u8; 32],
) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(player.0);
    hasher.update(monster.0);
    hasher.update(action_count.to_be_bytes());
    hasher.update(entropy);
    let digest: [u8; 32] = hasher.finalize().into();
    u64::from_be_bytes(digest[..8].try_into().unwrap())
}

/// Even rolls capture, odd rolls past the second action let the monster
/// escape, anything else is a miss. The 50% capture rate and the
/// escape-after-three-misses window are deliberate balance choices.
pub fn resolve_throw(
    player: EntityId,
    monster: EntityId,
    action_count: u64,
    entropy: &[u8; 32],
) -> ThrowResolution {
    let roll = throw_roll(player, monster, action_count, entropy);
    if roll % 2 == 0 {
        ThrowResolution::Caught
    } else if action_count > 2 {
        ThrowResolution::Escaped
    } else {
        ThrowResolution::Miss
    }
}

/// Health is not floored at zero and nothing watches for death; a negative
/// value is carried as-is.
pub fn apply_attack(record: &mut MonsterRecord, strength: u64) {
    record.health -= strength as i64;
}

/// Whether stepping onto a grass cell pulls the player into an encounter.
/// One cell in five does, deterministically in the entropy word.
pub fn should_start_encounter(player: EntityId, at: Position, entropy: &[u8; 32]) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(player.0);
    hasher.update(at.x.to_be_bytes());
    hasher.update(at.y.to_be_bytes());
    hasher.update(entropy);
    let digest: [u8; 32] = hasher.finalize().into();
    let roll = u64::from_be_bytes(digest[..8].try_into().unwrap());
    roll % 5 == 0
}
