//! In-memory world for tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{BlockPos, Facing};
use crate::world::{Block, World};

// ===========================================================================
// Energy sink
// ===========================================================================

/// A simple energy receiver placed in a [`GridWorld`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergySink {
    pub capacity: u64,
    pub stored: u64,
    /// Accept only through this side, if set.
    pub side: Option<Facing>,
}

impl EnergySink {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            stored: 0,
            side: None,
        }
    }

    pub fn receive(&mut self, side: Facing, units: u64) -> u64 {
        if self.side.is_some_and(|s| s != side) {
            return 0;
        }
        let accepted = units.min(self.capacity.saturating_sub(self.stored));
        self.stored += accepted;
        accepted
    }
}

// ===========================================================================
// Grid world
// ===========================================================================

/// In-memory sparse world. Counts block writes so callers can check that a
/// failed operation left the world untouched.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    blocks: BTreeMap<BlockPos, Block>,
    sinks: BTreeMap<BlockPos, EnergySink>,
    writes: u64,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an energy receiver at `pos`.
    pub fn place_sink(&mut self, pos: BlockPos, sink: EnergySink) {
        self.sinks.insert(pos, sink);
    }

    pub fn sink(&self, pos: BlockPos) -> Option<&EnergySink> {
        self.sinks.get(&pos)
    }

    /// Number of `set_block` calls since creation.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// All non-air blocks, in position order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockPos, &Block)> {
        self.blocks.iter()
    }
}

impl World for GridWorld {
    fn block(&self, pos: BlockPos) -> Block {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    fn set_block(&mut self, pos: BlockPos, block: Block) {
        self.writes += 1;
        if block == Block::Air {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    fn offer_energy(&mut self, pos: BlockPos, side: Facing, units: u64) -> u64 {
        match self.sinks.get_mut(&pos) {
            Some(sink) => sink.receive(side, units),
            None => 0,
        }
    }
}
