//! The narrow world interface the shaft subsystem needs.
//!
//! The surrounding game owns block registration and persistence. This crate
//! only reads and writes [`Block`] values at positions and offers external
//! energy units to whatever sits next to a formed structure.

use serde::{Deserialize, Serialize};

use crate::geometry::{BlockPos, Facing};
use crate::id::StructureId;

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Metal blocks usable as flywheel rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metal {
    Lead,
    Iron,
    Steel,
    Copper,
}

impl Metal {
    pub fn all() -> [Metal; 4] {
        [Metal::Lead, Metal::Iron, Metal::Steel, Metal::Copper]
    }

    /// Flywheel inertia relative to an iron ring.
    pub fn density_factor(self) -> f64 {
        match self {
            Metal::Lead => 1.45,
            Metal::Iron => 1.0,
            Metal::Steel => 1.02,
            Metal::Copper => 1.14,
        }
    }

    /// Flywheel speed limit relative to an iron ring.
    pub fn strength_factor(self) -> f64 {
        match self {
            Metal::Lead => 0.4,
            Metal::Iron => 1.0,
            Metal::Steel => 1.6,
            Metal::Copper => 0.7,
        }
    }
}

/// Role of a block that has been absorbed into a formed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormedRole {
    /// The origin end-cap; owns the structure's state.
    MasterEnd,
    /// The terminating end-cap.
    OtherEnd,
    /// Support block below an end-cap.
    Support,
    /// A block belonging to the segment at this index.
    Segment(u32),
}

/// A block that is part of a formed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormedBlock {
    pub structure: StructureId,
    pub role: FormedRole,
}

/// World content at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Block {
    #[default]
    Air,
    /// End-cap controller. A perfect bearing makes the structure lossless.
    Bearing { perfect: bool },
    /// Support required below each end-cap.
    HeavyEngineering,
    Shaft,
    CopperCoil,
    Electrode,
    KineticGenerator,
    Metal(Metal),
    Formed(FormedBlock),
}

impl Block {
    /// Matches the controller half of the end-cap pattern.
    pub fn is_controller(&self) -> bool {
        matches!(self, Block::Bearing { .. })
    }

    pub fn is_perfect_bearing(&self) -> bool {
        matches!(self, Block::Bearing { perfect: true })
    }

    /// Matches the support half of the end-cap pattern.
    pub fn is_support(&self) -> bool {
        matches!(self, Block::HeavyEngineering)
    }

    /// Blocks that segment patterns are built from. Pattern cells that are
    /// not part of a segment must not hold one of these.
    pub fn is_component(&self) -> bool {
        matches!(
            self,
            Block::Shaft
                | Block::CopperCoil
                | Block::Electrode
                | Block::KineticGenerator
                | Block::Metal(_)
        )
    }

    pub fn formed(&self) -> Option<FormedBlock> {
        match self {
            Block::Formed(f) => Some(*f),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// World trait
// ---------------------------------------------------------------------------

/// Block access plus the neighbour energy hook used when pushing power out
/// of a structure.
pub trait World {
    /// The block at `pos`. Unknown positions are air.
    fn block(&self, pos: BlockPos) -> Block;

    /// Replace the block at `pos`.
    fn set_block(&mut self, pos: BlockPos, block: Block);

    /// Offer `units` of external energy to the receiver at `pos`, entering
    /// through its `side`. Returns how many units were accepted.
    fn offer_energy(&mut self, pos: BlockPos, side: Facing, units: u64) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_classification() {
        assert!(Block::Bearing { perfect: false }.is_controller());
        assert!(!Block::Bearing { perfect: false }.is_perfect_bearing());
        assert!(Block::Bearing { perfect: true }.is_perfect_bearing());
        assert!(Block::HeavyEngineering.is_support());
        assert!(Block::Metal(Metal::Lead).is_component());
        assert!(!Block::HeavyEngineering.is_component());
        assert!(!Block::Air.is_component());
    }
}
