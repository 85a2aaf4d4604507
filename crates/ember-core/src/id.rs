//! Globally unique particle identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a particle the moment Emit claims its slot.
///
/// Ids come from a device-side u32 counter that is only ever post-incremented,
/// so they increase in spawn order. The counter wraps after `u32::MAX`; the
/// wrap skips 0, and an id comes back only after 2^32 - 1 further spawns,
/// long after any particle holding it has retired. The slot a particle lives
/// in is recycled immediately; its id is not.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleId(pub u32);

impl ParticleId {
    /// The first id the counter hands out. Zero marks a never-initialized record.
    pub const FIRST: Self = Self(1);

    /// Create a ParticleId from a raw counter value
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Whether this id was ever assigned by Emit
    pub fn is_assigned(&self) -> bool {
        self.0 >= Self::FIRST.0
    }
}

impl fmt::Debug for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticleId({})", self.0)
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
