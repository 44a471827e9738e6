//! Segment behaviour catalog.
//!
//! Each [`SegmentKind`] is paired with a [`SegmentSpec`]: geometry, inertia,
//! speed envelope, the exact block pattern that forms it, and its electrical
//! behaviour. The catalog is built once (optionally adjusted from
//! configuration) and then passed by reference; nothing here is global.

use serde::{Deserialize, Serialize};
use shaftwork_core::geometry::{Aabb, BlockPos, Facing, LocalFrame};
use shaftwork_core::waveform::WaveKind;
use shaftwork_core::world::{Block, Metal, World};

use crate::energy_io::{Transform, TransformLimit};
use crate::routing::BlockFace;

// ---------------------------------------------------------------------------
// Segment kinds
// ---------------------------------------------------------------------------

/// Number of segment kinds in the catalog.
pub const KIND_COUNT: usize = 8;

/// The catalog's segment types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Bare shaft.
    Shaft,
    /// Metal ring around the shaft; inertia depends on the metal.
    Flywheel,
    /// Two coils: single-phase generator/motor.
    SingleCoil,
    /// Four coils over two slices: multi-phase generator/motor.
    FourCoils,
    /// Two electrodes: single-phase AC port to the world.
    Electrodes,
    /// Four electrodes: multi-phase AC port to the world.
    FourElectrodes,
    /// Kinetic generator core: DC port that commutates to the bus.
    Commutator,
    /// Kinetic generator core with coils: multi-phase commutator.
    FourPhaseCommutator,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; KIND_COUNT] = [
        SegmentKind::Shaft,
        SegmentKind::Flywheel,
        SegmentKind::SingleCoil,
        SegmentKind::FourCoils,
        SegmentKind::Electrodes,
        SegmentKind::FourElectrodes,
        SegmentKind::Commutator,
        SegmentKind::FourPhaseCommutator,
    ];

    /// Position in [`SegmentKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable name used in saved records and configuration files.
    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::Shaft => "shaft",
            SegmentKind::Flywheel => "flywheel",
            SegmentKind::SingleCoil => "single_coil",
            SegmentKind::FourCoils => "four_coils",
            SegmentKind::Electrodes => "electrodes",
            SegmentKind::FourElectrodes => "four_electrodes",
            SegmentKind::Commutator => "commutator",
            SegmentKind::FourPhaseCommutator => "four_phase_commutator",
        }
    }

    pub fn from_name(name: &str) -> Option<SegmentKind> {
        SegmentKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Requirement for one cell of a pattern slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Not part of the segment; must not hold a component block.
    Free,
    /// Exactly this block.
    Is(Block),
    /// Any metal block, the same metal in every such cell of the segment.
    AnyMetal,
}

/// A 3x3 cross-section perpendicular to the shaft axis.
///
/// Indexed by local `(x, y)` with both in `-1..=1`; `(0, 0)` is the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    cells: [[Cell; 3]; 3],
}

impl Slice {
    /// A slice symmetric under 90 degree rotation.
    pub fn symmetric(center: Cell, sides: Cell, vertical: Cell, corners: Cell) -> Self {
        Self {
            cells: [
                [corners, vertical, corners],
                [sides, center, sides],
                [corners, vertical, corners],
            ],
        }
    }

    pub fn cell(&self, x: i32, y: i32) -> Cell {
        self.cells[(1 - y) as usize][(x + 1) as usize]
    }
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Electrical behaviour of a segment type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Purely mechanical.
    Inert,
    /// Converts between rotation and bus AC, up to `max_power` joules a tick.
    Coil { max_power: f64 },
    /// Buffers energy between the bus and the world through routed faces.
    Io {
        capacity: f64,
        transform: Transform,
        limit: TransformLimit,
        /// Kind of energy the world side delivers.
        external_kind: WaveKind,
    },
}

/// Static description of one segment type.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub kind: SegmentKind,
    /// Number of slices along the axis.
    pub length: u32,
    /// Inertia contributed to the assembly. Scaled by the metal for flywheels.
    pub inertia: f64,
    /// Speed above which the overload hook runs. Scaled by the metal for
    /// flywheels.
    pub max_speed: Option<f64>,
    pub multi_phase: bool,
    pub behavior: Behavior,
    /// Declared energy connection faces, in routing order.
    pub connections: Vec<BlockFace>,
    pub bounds: Aabb,
    pub enabled: bool,
    pub pattern: Vec<Slice>,
}

impl SegmentSpec {
    pub fn is_electrical(&self) -> bool {
        !matches!(self.behavior, Behavior::Inert)
    }

    /// Local positions (relative to the segment origin) that belong to the
    /// segment, slice by slice.
    pub fn occupied_cells(&self) -> Vec<BlockPos> {
        let mut cells = Vec::new();
        for (z, slice) in self.pattern.iter().enumerate() {
            for y in (-1..=1).rev() {
                for x in -1..=1 {
                    if slice.cell(x, y) != Cell::Free {
                        cells.push(BlockPos::new(x, y, z as i32));
                    }
                }
            }
        }
        cells
    }
}

/// Result of a successful formation test at one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMatch {
    pub kind: SegmentKind,
    pub length: u32,
    pub inertia: f64,
    pub max_speed: Option<f64>,
    pub material: Option<Metal>,
}

/// Errors from building a catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0:?}: length must be at least one")]
    ZeroLength(SegmentKind),
    #[error("{kind:?}: pattern has {slices} slices but length is {length}")]
    PatternLength {
        kind: SegmentKind,
        length: u32,
        slices: usize,
    },
    #[error("{0:?}: inertia must be finite and non-negative, got {1}")]
    InvalidInertia(SegmentKind, f64),
    #[error("{0:?}: buffer capacity and power must be finite and positive")]
    InvalidCapacity(SegmentKind),
    #[error("{0:?}: max speed must be finite and positive")]
    InvalidMaxSpeed(SegmentKind),
    #[error("{0:?}: connection face declared twice")]
    DuplicateConnection(SegmentKind),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for an immutable [`Catalog`]: start from the standard table,
/// adjust specs, then validate with [`build`](CatalogBuilder::build).
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    specs: Vec<SegmentSpec>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::standard()
    }
}

impl CatalogBuilder {
    /// The standard segment table.
    pub fn standard() -> Self {
        Self {
            specs: standard_specs(),
        }
    }

    /// Adjust the spec of one kind.
    pub fn mutate<F>(&mut self, kind: SegmentKind, f: F) -> &mut Self
    where
        F: FnOnce(&mut SegmentSpec),
    {
        f(&mut self.specs[kind.index()]);
        self
    }

    pub fn set_enabled(&mut self, kind: SegmentKind, enabled: bool) -> &mut Self {
        self.mutate(kind, |spec| spec.enabled = enabled)
    }

    /// Validate every spec and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        for spec in &self.specs {
            validate_spec(spec)?;
        }
        Ok(Catalog { specs: self.specs })
    }
}

fn validate_spec(spec: &SegmentSpec) -> Result<(), CatalogError> {
    let kind = spec.kind;
    if spec.length == 0 {
        return Err(CatalogError::ZeroLength(kind));
    }
    if spec.pattern.len() != spec.length as usize {
        return Err(CatalogError::PatternLength {
            kind,
            length: spec.length,
            slices: spec.pattern.len(),
        });
    }
    if !spec.inertia.is_finite() || spec.inertia < 0.0 {
        return Err(CatalogError::InvalidInertia(kind, spec.inertia));
    }
    if spec.max_speed.is_some_and(|s| !s.is_finite() || s <= 0.0) {
        return Err(CatalogError::InvalidMaxSpeed(kind));
    }
    let positive = |v: f64| v.is_finite() && v > 0.0;
    match spec.behavior {
        Behavior::Inert => {}
        Behavior::Coil { max_power } if !positive(max_power) => {
            return Err(CatalogError::InvalidCapacity(kind));
        }
        Behavior::Io { capacity, .. } if !positive(capacity) => {
            return Err(CatalogError::InvalidCapacity(kind));
        }
        _ => {}
    }
    for (i, face) in spec.connections.iter().enumerate() {
        if spec.connections[..i].contains(face) {
            return Err(CatalogError::DuplicateConnection(kind));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable table of segment types.
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<SegmentSpec>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            specs: standard_specs(),
        }
    }
}

impl Catalog {
    pub fn spec(&self, kind: SegmentKind) -> &SegmentSpec {
        &self.specs[kind.index()]
    }

    pub fn specs(&self) -> impl Iterator<Item = &SegmentSpec> {
        self.specs.iter()
    }

    /// Test whether `kind` forms at the origin of `frame`.
    ///
    /// Every cell of every slice is checked, so patterns are exact: a
    /// component block in a cell the pattern leaves free rejects the match.
    pub fn try_form<W>(&self, kind: SegmentKind, world: &W, frame: &LocalFrame) -> Option<SegmentMatch>
    where
        W: World + ?Sized,
    {
        let spec = self.spec(kind);
        if !spec.enabled {
            return None;
        }
        let mut material: Option<Metal> = None;
        for (z, slice) in spec.pattern.iter().enumerate() {
            for y in -1..=1 {
                for x in -1..=1 {
                    let block = world.block(frame.to_real(BlockPos::new(x, y, z as i32)));
                    match slice.cell(x, y) {
                        Cell::Free => {
                            if block.is_component() {
                                return None;
                            }
                        }
                        Cell::Is(required) => {
                            if block != required {
                                return None;
                            }
                        }
                        Cell::AnyMetal => {
                            let Block::Metal(metal) = block else {
                                return None;
                            };
                            if *material.get_or_insert(metal) != metal {
                                return None;
                            }
                        }
                    }
                }
            }
        }
        let density = material.map_or(1.0, Metal::density_factor);
        let strength = material.map_or(1.0, Metal::strength_factor);
        Some(SegmentMatch {
            kind,
            length: spec.length,
            inertia: spec.inertia * density,
            max_speed: spec.max_speed.map(|s| s * strength),
            material,
        })
    }
}

// ---------------------------------------------------------------------------
// Standard table
// ---------------------------------------------------------------------------

const COMMUTATOR_RAMP: TransformLimit = TransformLimit::Ramp {
    min: 5.0,
    max: 10.0,
};

fn face(x: i32, y: i32, z: i32, facing: Facing) -> BlockFace {
    BlockFace::new(BlockPos::new(x, y, z), facing)
}

fn standard_specs() -> Vec<SegmentSpec> {
    use Cell::{AnyMetal, Free, Is};

    let shaft_core = Is(Block::Shaft);
    let generator_core = Is(Block::KineticGenerator);
    let coil = Is(Block::CopperCoil);
    let electrode = Is(Block::Electrode);

    let specs = vec![
        SegmentSpec {
            kind: SegmentKind::Shaft,
            length: 1,
            inertia: 25.0,
            max_speed: None,
            multi_phase: false,
            behavior: Behavior::Inert,
            connections: Vec::new(),
            bounds: Aabb::new([0.375, 0.375, 0.0], [0.625, 0.625, 1.0]),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, Free, Free, Free)],
        },
        SegmentSpec {
            kind: SegmentKind::Flywheel,
            length: 1,
            inertia: 3800.0,
            max_speed: Some(150.0),
            multi_phase: false,
            behavior: Behavior::Inert,
            connections: Vec::new(),
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, AnyMetal, AnyMetal, AnyMetal)],
        },
        SegmentSpec {
            kind: SegmentKind::SingleCoil,
            length: 1,
            inertia: 50.0,
            max_speed: Some(500.0),
            multi_phase: false,
            behavior: Behavior::Coil { max_power: 2000.0 },
            connections: Vec::new(),
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, coil, Free, Free)],
        },
        SegmentSpec {
            kind: SegmentKind::FourCoils,
            length: 2,
            inertia: 100.0,
            max_speed: Some(500.0),
            multi_phase: true,
            behavior: Behavior::Coil { max_power: 8000.0 },
            connections: Vec::new(),
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, coil, coil, Free); 2],
        },
        SegmentSpec {
            kind: SegmentKind::Electrodes,
            length: 1,
            inertia: 50.0,
            max_speed: None,
            multi_phase: false,
            behavior: Behavior::Io {
                capacity: 10_000.0,
                transform: Transform::Identity,
                limit: TransformLimit::Unity,
                external_kind: WaveKind::Ac,
            },
            connections: vec![face(-1, 0, 0, Facing::West), face(1, 0, 0, Facing::East)],
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, electrode, Free, Free)],
        },
        SegmentSpec {
            kind: SegmentKind::FourElectrodes,
            length: 1,
            inertia: 50.0,
            max_speed: None,
            multi_phase: true,
            behavior: Behavior::Io {
                capacity: 40_000.0,
                transform: Transform::Identity,
                limit: TransformLimit::Unity,
                external_kind: WaveKind::Ac,
            },
            connections: vec![
                face(-1, 0, 0, Facing::West),
                face(1, 0, 0, Facing::East),
                face(0, 1, 0, Facing::Up),
                face(0, -1, 0, Facing::Down),
            ],
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(shaft_core, electrode, electrode, Free)],
        },
        SegmentSpec {
            kind: SegmentKind::Commutator,
            length: 1,
            inertia: 50.0,
            max_speed: Some(100.0),
            multi_phase: false,
            behavior: Behavior::Io {
                capacity: 2_500.0,
                transform: Transform::Commutate,
                limit: COMMUTATOR_RAMP,
                external_kind: WaveKind::Dc,
            },
            connections: vec![face(0, 0, 0, Facing::Up)],
            bounds: Aabb::new([0.0, 0.375 - 1.0 / 32.0, 0.0], [1.0, 1.0, 1.0]),
            enabled: true,
            pattern: vec![Slice::symmetric(generator_core, Free, Free, Free)],
        },
        SegmentSpec {
            kind: SegmentKind::FourPhaseCommutator,
            length: 1,
            inertia: 100.0,
            max_speed: Some(100.0),
            multi_phase: true,
            behavior: Behavior::Io {
                capacity: 10_000.0,
                transform: Transform::Commutate,
                limit: COMMUTATOR_RAMP,
                external_kind: WaveKind::Dc,
            },
            connections: vec![face(0, 0, 0, Facing::Up)],
            bounds: Aabb::full(),
            enabled: true,
            pattern: vec![Slice::symmetric(generator_core, coil, Free, Free)],
        },
    ];
    debug_assert!(specs.iter().enumerate().all(|(i, s)| s.kind.index() == i));
    specs
}
