//! Shaftwork Mech -- formed rotating-shaft structures.
//!
//! A structure is a straight line of typed segments between two bearing
//! end-caps. Forming one absorbs its blocks into the structure and creates a
//! [`RotatingAssembly`] shared by every segment. Each tick the module applies
//! bearing friction, runs the electrical bus of every structure, pushes AC
//! out of routed faces, and runs overload hooks for segments spinning past
//! their limit.
//!
//! # Design
//!
//! - Structures and assemblies live in slot-map arenas. Segments refer to
//!   their assembly by [`AssemblyId`]; disassembly removes the assembly in
//!   the same call, so stale handles resolve to `None`.
//! - Formation validates fully in memory before writing a single block.
//! - Events are returned from [`ShaftModule::tick`], including formation and
//!   disassembly events queued since the previous tick.

pub mod bus;
pub mod catalog;
pub mod energy_io;
pub mod matcher;
pub mod routing;
pub mod segment;
pub mod serialize;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use shaftwork_core::assembly::RotatingAssembly;
use shaftwork_core::conversion::EnergyConversion;
use shaftwork_core::geometry::{BlockPos, Facing, LocalFrame};
use shaftwork_core::id::{AssemblyId, StructureId};
use shaftwork_core::waveform::WaveKind;
use shaftwork_core::world::{Block, FormedBlock, FormedRole, World};
use slotmap::SlotMap;

use crate::bus::{electrical_sections, run_section};
use crate::catalog::{Catalog, SegmentKind};
use crate::matcher::{FormationError, FormationPlan, StructureMatcher};
use crate::routing::BlockFace;
use crate::segment::{Actor, InteractResult, OverloadOutcome, Segment, Tool};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime parameters fixed when the module is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MechSettings {
    pub conversion: EnergyConversion,
    /// Fraction of kinetic energy lossy assemblies shed each tick.
    pub friction_per_tick: f64,
    /// Longest structure the matcher will scan, in segments.
    pub max_segments: usize,
}

impl Default for MechSettings {
    fn default() -> Self {
        Self {
            conversion: EnergyConversion::default(),
            friction_per_tick: 0.001,
            max_segments: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// Structures and events
// ---------------------------------------------------------------------------

/// A block absorbed into a structure, with what stood there before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsorbedBlock {
    pub pos: BlockPos,
    pub role: FormedRole,
    pub original: Block,
}

/// A formed structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Anchored at the master end-cap, facing along the shaft.
    pub frame: LocalFrame,
    pub assembly: AssemblyId,
    pub segments: Vec<Segment>,
    /// Axis offset of the terminating end-cap.
    pub far_end: i32,
    absorbed: Vec<AbsorbedBlock>,
    shattered: BTreeSet<usize>,
}

impl Structure {
    pub fn master(&self) -> BlockPos {
        self.frame.origin
    }

    pub fn absorbed(&self) -> &[AbsorbedBlock] {
        &self.absorbed
    }

    /// Index of the segment covering axis offset `z`.
    pub fn segment_at(&self, z: i32) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| z >= s.offset && z < s.offset + s.length as i32)
    }

    /// Segment index and segment-local position for a world position.
    fn locate(&self, pos: BlockPos) -> Option<(usize, BlockPos)> {
        let local = self.frame.to_local(pos);
        let index = self.segment_at(local.z)?;
        let offset = self.segments[index].offset;
        Some((index, BlockPos::new(local.x, local.y, local.z - offset)))
    }
}

/// Things that happened to structures.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaftEvent {
    Formed {
        structure: StructureId,
        master: BlockPos,
        segments: usize,
    },
    Disassembled {
        structure: StructureId,
    },
    /// A segment spun past its limit. `destroyed` segments take their
    /// structure apart at the end of the tick.
    Overloaded {
        structure: StructureId,
        segment: usize,
        kind: SegmentKind,
        speed: f64,
        destroyed: bool,
        tick: u64,
    },
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Owns every formed structure and drives them each tick.
#[derive(Debug)]
pub struct ShaftModule {
    catalog: Catalog,
    settings: MechSettings,
    matcher: StructureMatcher,
    assemblies: SlotMap<AssemblyId, RotatingAssembly>,
    structures: SlotMap<StructureId, Structure>,
    tiles: BTreeMap<BlockPos, StructureId>,
    dirty: BTreeSet<StructureId>,
    pending: Vec<ShaftEvent>,
}

impl Default for ShaftModule {
    fn default() -> Self {
        Self::new(Catalog::default(), MechSettings::default())
    }
}

impl ShaftModule {
    pub fn new(catalog: Catalog, settings: MechSettings) -> Self {
        Self {
            catalog,
            settings,
            matcher: StructureMatcher::new(),
            assemblies: SlotMap::with_key(),
            structures: SlotMap::with_key(),
            tiles: BTreeMap::new(),
            dirty: BTreeSet::new(),
            pending: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &MechSettings {
        &self.settings
    }

    pub fn matcher(&self) -> &StructureMatcher {
        &self.matcher
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// The structure a world position belongs to.
    pub fn structure_at(&self, pos: BlockPos) -> Option<StructureId> {
        self.tiles.get(&pos).copied()
    }

    pub fn assembly(&self, id: AssemblyId) -> Option<&RotatingAssembly> {
        self.assemblies.get(id)
    }

    pub fn assembly_mut(&mut self, id: AssemblyId) -> Option<&mut RotatingAssembly> {
        self.assemblies.get_mut(id)
    }

    /// Structures whose observable state changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<StructureId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    // -- Formation -----------------------------------------------------------

    /// Try to form a structure whose origin end-cap is at `pos`, triggered
    /// through the `clicked` face. On failure the world is untouched.
    pub fn try_form<W>(&mut self, world: &mut W, pos: BlockPos, clicked: Facing) -> Result<StructureId, FormationError>
    where
        W: World + ?Sized,
    {
        let plan = self
            .matcher
            .plan(&self.catalog, &*world, pos, clicked, self.settings.max_segments)?;
        Ok(self.commit(world, plan))
    }

    fn footprint(&self, plan: &FormationPlan) -> Vec<(BlockPos, FormedRole)> {
        let frame = plan.frame;
        let master = frame.origin;
        let far = frame.to_real(BlockPos::new(0, 0, plan.far_end));
        let mut cells = vec![(master, FormedRole::MasterEnd), (master.below(), FormedRole::Support)];
        for (index, planned) in plan.segments.iter().enumerate() {
            let segment_frame = frame.shifted(BlockPos::new(0, 0, planned.offset));
            for local in self.catalog.spec(planned.matched.kind).occupied_cells() {
                cells.push((segment_frame.to_real(local), FormedRole::Segment(index as u32)));
            }
        }
        cells.push((far, FormedRole::OtherEnd));
        cells.push((far.below(), FormedRole::Support));
        cells
    }

    fn commit<W>(&mut self, world: &mut W, plan: FormationPlan) -> StructureId
    where
        W: World + ?Sized,
    {
        let absorbed: Vec<AbsorbedBlock> = self
            .footprint(&plan)
            .into_iter()
            .map(|(pos, role)| AbsorbedBlock {
                pos,
                role,
                original: world.block(pos),
            })
            .collect();

        let assembly = self.assemblies.insert(RotatingAssembly::from_inertias(
            plan.segments.iter().map(|s| s.matched.inertia),
            plan.is_lossless,
        ));
        let segments: Vec<Segment> = plan
            .segments
            .iter()
            .map(|p| Segment::new(self.catalog.spec(p.matched.kind), &p.matched, p.offset, assembly))
            .collect();
        let segment_count = segments.len();
        let id = self.structures.insert(Structure {
            frame: plan.frame,
            assembly,
            segments,
            far_end: plan.far_end,
            absorbed,
            shattered: BTreeSet::new(),
        });
        self.stamp(world, id);

        tracing::info!(
            master = ?plan.frame.origin,
            segments = segment_count,
            inertia = plan.total_inertia(),
            lossless = plan.is_lossless,
            "shaft structure formed"
        );
        self.pending.push(ShaftEvent::Formed {
            structure: id,
            master: plan.frame.origin,
            segments: segment_count,
        });
        self.dirty.insert(id);
        id
    }

    /// Write formed-part blocks for every absorbed position and index them.
    fn stamp<W>(&mut self, world: &mut W, id: StructureId)
    where
        W: World + ?Sized,
    {
        let Some(structure) = self.structures.get(id) else {
            return;
        };
        for cell in &structure.absorbed {
            world.set_block(
                cell.pos,
                Block::Formed(FormedBlock {
                    structure: id,
                    role: cell.role,
                }),
            );
            self.tiles.insert(cell.pos, id);
        }
    }

    /// Take a structure apart, restoring every absorbed block that is still
    /// part of it. Shattered flywheel rings are lost. Returns `false` if the
    /// structure does not exist.
    pub fn disassemble<W>(&mut self, world: &mut W, id: StructureId) -> bool
    where
        W: World + ?Sized,
    {
        let Some(structure) = self.structures.remove(id) else {
            return false;
        };
        self.assemblies.remove(structure.assembly);
        self.dirty.remove(&id);

        for cell in &structure.absorbed {
            self.tiles.remove(&cell.pos);
            let still_ours = world.block(cell.pos).formed().is_some_and(|f| f.structure == id);
            if !still_ours {
                continue;
            }
            let lost = match cell.role {
                FormedRole::Segment(i) => {
                    structure.shattered.contains(&(i as usize)) && matches!(cell.original, Block::Metal(_))
                }
                _ => false,
            };
            world.set_block(cell.pos, if lost { Block::Air } else { cell.original });
        }

        tracing::info!(master = ?structure.master(), "shaft structure disassembled");
        self.pending.push(ShaftEvent::Disassembled { structure: id });
        true
    }

    /// A block at `pos` was removed from the world. Disassembles the
    /// structure it belonged to, if any.
    pub fn on_block_removed<W>(&mut self, world: &mut W, pos: BlockPos) -> bool
    where
        W: World + ?Sized,
    {
        match self.structure_at(pos) {
            Some(id) => self.disassemble(world, id),
            None => false,
        }
    }

    // -- Interaction and external energy -------------------------------------

    /// An actor used `tool` on face `face` of the formed block at `pos`.
    pub fn interact(&mut self, pos: BlockPos, face: Facing, actor: Actor, tool: Tool) -> InteractResult {
        let Some(id) = self.structure_at(pos) else {
            return InteractResult::NotHandled;
        };
        let Some(structure) = self.structures.get_mut(id) else {
            return InteractResult::NotHandled;
        };
        let Some((index, local)) = structure.locate(pos) else {
            return InteractResult::NotHandled;
        };
        let local_face = structure.frame.to_local_facing(face);
        let result = structure.segments[index].interact(local_face, local, actor, tool);
        if result == InteractResult::HandledUpdate {
            tracing::debug!(?pos, ?face, "side routing changed");
            self.dirty.insert(id);
        }
        result
    }

    fn port(&mut self, pos: BlockPos, face: Facing) -> Option<(&mut Segment, BlockFace)> {
        let id = self.structure_at(pos)?;
        let structure = self.structures.get_mut(id)?;
        let (index, local) = structure.locate(pos)?;
        let local_face = structure.frame.to_local_facing(face);
        Some((&mut structure.segments[index], BlockFace::new(local, local_face)))
    }

    /// A neighbour pushes `units` into face `face` of the formed block at
    /// `pos`. Returns the units accepted.
    pub fn receive_external(&mut self, pos: BlockPos, face: Facing, units: u64, simulate: bool) -> u64 {
        let conversion = self.settings.conversion;
        match self.port(pos, face) {
            Some((segment, port)) => segment
                .io_mut()
                .map_or(0, |io| io.receive_external(&port, units, simulate, &conversion)),
            None => 0,
        }
    }

    /// A neighbour network carrying `kind` pulls up to `units` from face
    /// `face` of the formed block at `pos`. Returns the units given.
    pub fn extract_external(&mut self, pos: BlockPos, face: Facing, units: u64, kind: WaveKind, simulate: bool) -> u64 {
        let conversion = self.settings.conversion;
        match self.port(pos, face) {
            Some((segment, port)) => segment
                .io_mut()
                .map_or(0, |io| io.extract_external(&port, units, kind, simulate, &conversion)),
            None => 0,
        }
    }

    // -- Tick ----------------------------------------------------------------

    /// Advance every structure by one tick.
    pub fn tick<W>(&mut self, world: &mut W, current_tick: u64) -> Vec<ShaftEvent>
    where
        W: World + ?Sized,
    {
        let mut events = std::mem::take(&mut self.pending);
        let mut doomed = Vec::new();

        for (id, structure) in self.structures.iter_mut() {
            let Some(assembly) = self.assemblies.get_mut(structure.assembly) else {
                continue;
            };
            assembly.apply_friction(self.settings.friction_per_tick);

            for section in electrical_sections(&structure.segments) {
                if let Err(e) = run_section(&mut structure.segments[section], assembly) {
                    tracing::warn!(master = ?structure.frame.origin, error = %e, "bus transfer failed");
                }
            }

            let frame = structure.frame;
            for segment in structure.segments.iter_mut() {
                let segment_frame = segment.frame(&frame);
                if let Some(io) = segment.io_mut() {
                    io.push_to_world(world, &segment_frame, &self.settings.conversion);
                }
            }

            let speed = assembly.speed();
            for (index, segment) in structure.segments.iter_mut().enumerate() {
                if !segment.is_overloaded(speed) {
                    continue;
                }
                let destroyed = segment.on_overload() == OverloadOutcome::Destroyed;
                tracing::warn!(
                    master = ?frame.origin,
                    kind = segment.kind.name(),
                    speed,
                    destroyed,
                    "segment overloaded"
                );
                if destroyed {
                    structure.shattered.insert(index);
                    doomed.push(id);
                }
                events.push(ShaftEvent::Overloaded {
                    structure: id,
                    segment: index,
                    kind: segment.kind,
                    speed,
                    destroyed,
                    tick: current_tick,
                });
            }
        }

        doomed.dedup();
        for id in doomed {
            self.disassemble(world, id);
        }
        events.append(&mut self.pending);
        events
    }
}
