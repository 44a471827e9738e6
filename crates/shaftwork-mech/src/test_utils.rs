//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use shaftwork_core::geometry::{BlockPos, Facing, LocalFrame};
use shaftwork_core::world::{Block, Metal, World};

use crate::catalog::{Catalog, Cell, SegmentKind};

// ===========================================================================
// Chain builder
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Kind(SegmentKind),
    Flywheel(Metal),
}

/// Places an unformed structure in a world: a bearing end-cap at `origin`,
/// segment blocks heading towards `facing`, and a terminating end-cap.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    origin: BlockPos,
    facing: Facing,
    origin_lossless: bool,
    far_lossless: bool,
    parts: Vec<Part>,
}

/// Where a built chain ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltChain {
    pub origin: BlockPos,
    /// Face to click on the origin bearing to form the chain.
    pub trigger: Facing,
    pub far_end: BlockPos,
    /// Axis offset of the far end-cap.
    pub length: i32,
}

impl ChainBuilder {
    /// Lossless end-caps by default.
    pub fn new(origin: BlockPos, facing: Facing) -> Self {
        Self {
            origin,
            facing,
            origin_lossless: true,
            far_lossless: true,
            parts: Vec::new(),
        }
    }

    pub fn segment(mut self, kind: SegmentKind) -> Self {
        self.parts.push(match kind {
            SegmentKind::Flywheel => Part::Flywheel(Metal::Iron),
            other => Part::Kind(other),
        });
        self
    }

    /// Append segments; flywheels get iron rings.
    pub fn segments(self, kinds: &[SegmentKind]) -> Self {
        kinds.iter().fold(self, |b, &k| b.segment(k))
    }

    pub fn flywheel(mut self, metal: Metal) -> Self {
        self.parts.push(Part::Flywheel(metal));
        self
    }

    pub fn lossless(mut self, lossless: bool) -> Self {
        self.origin_lossless = lossless;
        self.far_lossless = lossless;
        self
    }

    pub fn far_lossless(mut self, lossless: bool) -> Self {
        self.far_lossless = lossless;
        self
    }

    pub fn build<W: World + ?Sized>(&self, world: &mut W) -> BuiltChain {
        let catalog = Catalog::default();
        let frame = LocalFrame::new(self.origin, self.facing, false);
        place_end_cap(world, self.origin, self.origin_lossless);

        let mut z = 1;
        for part in &self.parts {
            let (kind, metal) = match *part {
                Part::Kind(kind) => (kind, Metal::Iron),
                Part::Flywheel(metal) => (SegmentKind::Flywheel, metal),
            };
            let spec = catalog.spec(kind);
            for (dz, slice) in spec.pattern.iter().enumerate() {
                for y in -1..=1 {
                    for x in -1..=1 {
                        let block = match slice.cell(x, y) {
                            Cell::Free => continue,
                            Cell::Is(block) => block,
                            Cell::AnyMetal => Block::Metal(metal),
                        };
                        world.set_block(frame.to_real(BlockPos::new(x, y, z + dz as i32)), block);
                    }
                }
            }
            z += spec.length as i32;
        }

        let far_end = frame.to_real(BlockPos::new(0, 0, z));
        place_end_cap(world, far_end, self.far_lossless);
        BuiltChain {
            origin: self.origin,
            trigger: self.facing.opposite(),
            far_end,
            length: z,
        }
    }
}

/// Bearing at `pos` on heavy engineering.
pub fn place_end_cap<W: World + ?Sized>(world: &mut W, pos: BlockPos, perfect: bool) {
    world.set_block(pos, Block::Bearing { perfect });
    world.set_block(pos.below(), Block::HeavyEngineering);
}

/// Sum of catalog inertia for `kinds`, flywheels counted with iron rings.
pub fn expected_inertia(kinds: &[SegmentKind]) -> f64 {
    let catalog = Catalog::default();
    kinds.iter().map(|&k| catalog.spec(k).inertia).sum()
}
