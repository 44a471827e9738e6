//! Block positions, facings, and the orientation-relative local frame used
//! by structure matching.
//!
//! Local frame convention: `+z` runs along the shaft axis (the frame's
//! facing), `+y` is up, and `+x` is the lateral axis. A frame facing
//! [`Facing::South`] with no mirroring is the identity transform.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// An integer block position (world or local coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring position one step towards `facing`.
    pub fn offset(self, facing: Facing) -> Self {
        let (dx, dy, dz) = facing.delta();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The position directly below.
    pub fn below(self) -> Self {
        self.offset(Facing::Down)
    }
}

impl Add for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// The six block faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Facing {
    /// All six facings.
    pub fn all() -> [Facing; 6] {
        [
            Facing::Down,
            Facing::Up,
            Facing::North,
            Facing::South,
            Facing::West,
            Facing::East,
        ]
    }

    /// The four horizontal facings, clockwise from north.
    pub fn horizontals() -> [Facing; 4] {
        [Facing::North, Facing::East, Facing::South, Facing::West]
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Facing::Up | Facing::Down)
    }

    pub fn is_horizontal(self) -> bool {
        !self.is_vertical()
    }

    pub fn opposite(self) -> Facing {
        match self {
            Facing::Down => Facing::Up,
            Facing::Up => Facing::Down,
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::West => Facing::East,
            Facing::East => Facing::West,
        }
    }

    /// Rotate clockwise around the vertical axis (seen from above).
    /// Vertical facings are unchanged.
    pub fn rotate_cw(self) -> Facing {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
            vertical => vertical,
        }
    }

    /// Rotate counter-clockwise around the vertical axis.
    pub fn rotate_ccw(self) -> Facing {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
            vertical => vertical,
        }
    }

    /// Unit step `(dx, dy, dz)` for this facing.
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Facing::Down => (0, -1, 0),
            Facing::Up => (0, 1, 0),
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::West => (-1, 0, 0),
            Facing::East => (1, 0, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Local frame
// ---------------------------------------------------------------------------

/// An orientation-relative view of the world anchored at `origin`.
///
/// Local `+z` maps to `facing`, local `+x` maps to the facing rotated
/// counter-clockwise (or clockwise when mirrored), local `+y` stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalFrame {
    pub origin: BlockPos,
    pub facing: Facing,
    pub mirrored: bool,
}

impl LocalFrame {
    /// Create a frame. `facing` must be horizontal.
    pub fn new(origin: BlockPos, facing: Facing, mirrored: bool) -> Self {
        debug_assert!(facing.is_horizontal(), "local frames face horizontally");
        Self {
            origin,
            facing,
            mirrored,
        }
    }

    /// The same orientation anchored at a different origin.
    pub fn with_origin(&self, origin: BlockPos) -> Self {
        Self { origin, ..*self }
    }

    /// The same orientation re-anchored at a local position of this frame.
    pub fn shifted(&self, local: BlockPos) -> Self {
        self.with_origin(self.to_real(local))
    }

    fn lateral(&self) -> Facing {
        if self.mirrored {
            self.facing.rotate_cw()
        } else {
            self.facing.rotate_ccw()
        }
    }

    /// Convert a local position into world coordinates.
    pub fn to_real(&self, local: BlockPos) -> BlockPos {
        let (fx, _, fz) = self.facing.delta();
        let (lx, _, lz) = self.lateral().delta();
        BlockPos::new(
            self.origin.x + fx * local.z + lx * local.x,
            self.origin.y + local.y,
            self.origin.z + fz * local.z + lz * local.x,
        )
    }

    /// Convert a world position into local coordinates.
    pub fn to_local(&self, real: BlockPos) -> BlockPos {
        let d = real - self.origin;
        let (fx, _, fz) = self.facing.delta();
        let (lx, _, lz) = self.lateral().delta();
        BlockPos::new(d.x * lx + d.z * lz, d.y, d.x * fx + d.z * fz)
    }

    /// Convert a local facing into a world facing.
    pub fn to_real_facing(&self, local: Facing) -> Facing {
        match local {
            Facing::Up | Facing::Down => local,
            Facing::South => self.facing,
            Facing::North => self.facing.opposite(),
            Facing::East => self.lateral(),
            Facing::West => self.lateral().opposite(),
        }
    }

    /// Convert a world facing into a local facing.
    pub fn to_local_facing(&self, real: Facing) -> Facing {
        Facing::all()
            .into_iter()
            .find(|&f| self.to_real_facing(f) == real)
            .unwrap_or(real)
    }
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Axis-aligned box in block-local coordinates (`0..1` spans a full block).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// A full block.
    pub const fn full() -> Self {
        Self::new([0.0; 3], [1.0; 3])
    }

    pub fn volume(&self) -> f64 {
        (0..3).map(|i| (self.max[i] - self.min[i]).max(0.0)).product()
    }
}
