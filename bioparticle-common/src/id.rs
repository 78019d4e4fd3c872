use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a particle slot. The generation is bumped every time a
/// slot is recycled, so a stale id never aliases a newer particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticleId {
    pub index: u32,
    pub generation: u32,
}

impl ParticleId {
    pub fn new(index: u32, generation: u32) -> Self {
        ParticleId { index, generation }
    }

    /// Slot index into the owning arena.
    pub fn slot(self) -> usize {
        self.index as usize
    }

    /// Packs the id into a single integer for compact output formats.
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        ParticleId { index: bits as u32, generation: (bits >> 32) as u32 }
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
