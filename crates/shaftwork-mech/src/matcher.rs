//! Structure detection.
//!
//! [`StructureMatcher::plan`] walks outward from a trigger position and
//! resolves every segment of a candidate structure without touching the
//! world. Committing the plan is the caller's job, so a failed scan never
//! leaves partial state behind.

use shaftwork_core::geometry::{BlockPos, Facing, LocalFrame};
use shaftwork_core::world::World;

use crate::catalog::{Catalog, KIND_COUNT, SegmentKind, SegmentMatch};

/// Why a scan did not produce a structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormationError {
    #[error("structures cannot be formed from the {0:?} face")]
    VerticalTrigger(Facing),
    #[error("no bearing on heavy engineering at {0:?}")]
    InvalidOriginEndCap(BlockPos),
    #[error("no segment or end-cap matches at {0:?}")]
    NoSegmentMatched(BlockPos),
    #[error("end-caps enclose no segments")]
    EmptyStructure,
    #[error("end-cap bearings disagree on losslessness")]
    LosslessMismatch,
    #[error("structure exceeds {0} segments")]
    TooLong(usize),
}

/// A segment resolved during the scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSegment {
    /// Distance from the origin end-cap along the axis.
    pub offset: i32,
    pub matched: SegmentMatch,
}

/// A fully validated structure, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct FormationPlan {
    /// Anchored at the origin end-cap, facing along the shaft.
    pub frame: LocalFrame,
    pub is_lossless: bool,
    /// Segments in walk order.
    pub segments: Vec<PlannedSegment>,
    /// Axis offset of the terminating end-cap.
    pub far_end: i32,
}

impl FormationPlan {
    pub fn total_inertia(&self) -> f64 {
        self.segments.iter().map(|s| s.matched.inertia).sum()
    }
}

/// Losslessness of the end-cap at `pos`, or `None` if there is no end-cap.
pub fn end_cap<W>(world: &W, pos: BlockPos) -> Option<bool>
where
    W: World + ?Sized,
{
    let controller = world.block(pos);
    if controller.is_controller() && world.block(pos.below()).is_support() {
        Some(controller.is_perfect_bearing())
    } else {
        None
    }
}

/// Scans for structures. Remembers which segment kinds form most often and
/// tries those first.
#[derive(Debug, Clone, Default)]
pub struct StructureMatcher {
    popularity: [u32; KIND_COUNT],
}

impl StructureMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn popularity(&self, kind: SegmentKind) -> u32 {
        self.popularity[kind.index()]
    }

    /// Kinds by descending popularity, ties in catalog order.
    pub fn search_order(&self) -> [SegmentKind; KIND_COUNT] {
        let mut order = SegmentKind::ALL;
        order.sort_by_key(|k| std::cmp::Reverse(self.popularity[k.index()]));
        order
    }

    /// Resolve the structure whose origin end-cap is at `pos`, triggered
    /// through `clicked`. The shaft extends away from the clicked face.
    pub fn plan<W>(
        &mut self,
        catalog: &Catalog,
        world: &W,
        pos: BlockPos,
        clicked: Facing,
        max_segments: usize,
    ) -> Result<FormationPlan, FormationError>
    where
        W: World + ?Sized,
    {
        if clicked.is_vertical() {
            return Err(FormationError::VerticalTrigger(clicked));
        }
        let is_lossless = end_cap(world, pos).ok_or(FormationError::InvalidOriginEndCap(pos))?;
        let frame = LocalFrame::new(pos, clicked.opposite(), false);
        let order = self.search_order();

        let mut segments: Vec<PlannedSegment> = Vec::new();
        let mut z = 1;
        loop {
            let here = frame.to_real(BlockPos::new(0, 0, z));
            if let Some(far_lossless) = end_cap(world, here) {
                if segments.is_empty() {
                    return Err(FormationError::EmptyStructure);
                }
                if far_lossless != is_lossless {
                    tracing::debug!(?pos, ?here, "end-cap losslessness differs");
                    return Err(FormationError::LosslessMismatch);
                }
                for s in &segments {
                    self.popularity[s.matched.kind.index()] += 1;
                }
                tracing::debug!(?pos, segments = segments.len(), far_end = z, "structure resolved");
                return Ok(FormationPlan {
                    frame,
                    is_lossless,
                    segments,
                    far_end: z,
                });
            }
            if segments.len() >= max_segments {
                return Err(FormationError::TooLong(max_segments));
            }
            let segment_frame = frame.with_origin(here);
            let matched = order
                .iter()
                .find_map(|&kind| catalog.try_form(kind, world, &segment_frame))
                .ok_or(FormationError::NoSegmentMatched(here))?;
            tracing::debug!(kind = matched.kind.name(), offset = z, "segment matched");
            segments.push(PlannedSegment { offset: z, matched });
            z += matched.length as i32;
        }
    }
}
