//! Per-position state of a formed segment.
//!
//! A [`Segment`] records where it sits in its structure, what it contributes
//! to the shared assembly, and (for electrical types) its energy state. It
//! reaches the assembly only through an [`AssemblyId`] handle; callers pass
//! the resolved [`RotatingAssembly`] into every operation that needs speed.

use shaftwork_core::assembly::RotatingAssembly;
use shaftwork_core::geometry::{Aabb, BlockPos, Facing, LocalFrame};
use shaftwork_core::id::AssemblyId;
use shaftwork_core::waveform::{Phases, Source, WaveKind, Waveform};
use shaftwork_core::world::Metal;

use crate::catalog::{Behavior, SegmentKind, SegmentMatch, SegmentSpec};
use crate::energy_io::{EnergyError, EnergyIo, IoProfile};
use crate::routing::BlockFace;

// ---------------------------------------------------------------------------
// Interaction types
// ---------------------------------------------------------------------------

/// Who is interacting. Observers mirror state and never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub authoritative: bool,
}

impl Actor {
    pub const AUTHORITY: Actor = Actor { authoritative: true };
    pub const OBSERVER: Actor = Actor { authoritative: false };
}

/// What the actor is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Hammer,
    Other,
}

/// Outcome of [`Segment::interact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractResult {
    /// Wrong tool, or a face the segment does not declare.
    NotHandled,
    /// Recognised, but the actor may not change anything.
    HandledNoUpdate,
    /// Routing changed; observers need a state refresh.
    HandledUpdate,
}

/// Outcome of a segment's overload hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadOutcome {
    Ignored,
    /// The segment destroyed itself; its structure must disassemble.
    Destroyed,
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// Electrical state of a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentState {
    Inert,
    /// Generator/motor: the assembly's kinetic energy is its buffer.
    Coil { multi_phase: bool, max_power: f64 },
    Io(EnergyIo),
}

/// One positional unit of a formed structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Distance from the master end-cap along the axis.
    pub offset: i32,
    pub kind: SegmentKind,
    pub length: u32,
    pub inertia: f64,
    pub max_speed: Option<f64>,
    pub bounds: Aabb,
    pub material: Option<Metal>,
    pub assembly: AssemblyId,
    state: SegmentState,
}

impl Segment {
    /// Fresh state for a segment that just formed.
    pub fn new(spec: &SegmentSpec, matched: &SegmentMatch, offset: i32, assembly: AssemblyId) -> Self {
        let state = match spec.behavior {
            Behavior::Inert => SegmentState::Inert,
            Behavior::Coil { max_power } => SegmentState::Coil {
                multi_phase: spec.multi_phase,
                max_power,
            },
            Behavior::Io {
                capacity,
                transform,
                limit,
                external_kind,
            } => SegmentState::Io(EnergyIo::new(
                IoProfile {
                    capacity,
                    transform,
                    limit,
                    multi_phase: spec.multi_phase,
                    external_kind,
                },
                &spec.connections,
            )),
        };
        Self {
            offset,
            kind: spec.kind,
            length: matched.length,
            inertia: matched.inertia,
            max_speed: matched.max_speed,
            bounds: spec.bounds,
            material: matched.material,
            assembly,
            state,
        }
    }

    pub fn state(&self) -> &SegmentState {
        &self.state
    }

    pub fn io(&self) -> Option<&EnergyIo> {
        match &self.state {
            SegmentState::Io(io) => Some(io),
            _ => None,
        }
    }

    pub fn io_mut(&mut self) -> Option<&mut EnergyIo> {
        match &mut self.state {
            SegmentState::Io(io) => Some(io),
            _ => None,
        }
    }

    /// Replace the I/O state with a restored one. Ignored for segments
    /// without I/O.
    pub fn restore_io(&mut self, io: EnergyIo) {
        if let SegmentState::Io(current) = &mut self.state {
            *current = io;
        }
    }

    pub fn is_electrical(&self) -> bool {
        !matches!(self.state, SegmentState::Inert)
    }

    pub fn is_coil(&self) -> bool {
        matches!(self.state, SegmentState::Coil { .. })
    }

    /// This segment's frame, given the structure's frame at the master end.
    pub fn frame(&self, structure: &LocalFrame) -> LocalFrame {
        structure.shifted(BlockPos::new(0, 0, self.offset))
    }

    // -- Bus operations ------------------------------------------------------

    pub fn produced_waveform(&self, speed: f64) -> Waveform {
        match &self.state {
            SegmentState::Inert => Waveform::none(Phases::Single),
            SegmentState::Coil { multi_phase, .. } => {
                let phases = Phases::from_multi(*multi_phase);
                if speed > 0.0 {
                    Waveform::new(WaveKind::Ac, phases, Source::Rotation)
                } else {
                    Waveform::none(phases)
                }
            }
            SegmentState::Io(io) => io.produced_waveform(speed),
        }
    }

    /// Energy this segment can hand to the bus this tick.
    pub fn available(&self, assembly: &RotatingAssembly) -> f64 {
        match &self.state {
            SegmentState::Inert => 0.0,
            SegmentState::Coil { max_power, .. } => {
                if assembly.speed() > 0.0 {
                    max_power.min(assembly.kinetic_energy())
                } else {
                    0.0
                }
            }
            SegmentState::Io(io) => io.available_to_assembly(assembly.speed()),
        }
    }

    /// Hand `amount` joules to the bus. `speed` is the speed the bus stage
    /// was evaluated at; I/O segments drain against its limit.
    pub fn extract(&mut self, amount: f64, speed: f64, assembly: &mut RotatingAssembly) -> Result<(), EnergyError> {
        let available = self.available(assembly);
        match &mut self.state {
            SegmentState::Inert => Err(EnergyError::NotElectrical),
            SegmentState::Coil { .. } => {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(EnergyError::InvalidAmount(amount));
                }
                if amount > available * (1.0 + 1e-9) {
                    return Err(EnergyError::ExceedsAvailable {
                        requested: amount,
                        available,
                    });
                }
                assembly.apply_energy(-amount);
                Ok(())
            }
            SegmentState::Io(io) => io.extract_to_assembly(amount, speed),
        }
    }

    /// Energy of `waveform` this segment would accept from the bus.
    pub fn request(&self, waveform: Waveform, assembly: &RotatingAssembly) -> f64 {
        match &self.state {
            SegmentState::Inert => 0.0,
            SegmentState::Coil {
                multi_phase,
                max_power,
            } => {
                if waveform.is_ac() && waveform.is_single_phase() != *multi_phase {
                    *max_power
                } else {
                    0.0
                }
            }
            SegmentState::Io(io) => io.request_capacity(waveform, assembly.speed()),
        }
    }

    /// Take `amount` joules of `waveform` from the bus, tagged as seen at
    /// `speed`.
    pub fn insert(
        &mut self,
        amount: f64,
        waveform: Waveform,
        speed: f64,
        assembly: &mut RotatingAssembly,
    ) -> Result<(), EnergyError> {
        match &mut self.state {
            SegmentState::Inert => Err(EnergyError::NotElectrical),
            SegmentState::Coil { max_power, .. } => {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(EnergyError::InvalidAmount(amount));
                }
                if amount > *max_power * (1.0 + 1e-9) {
                    return Err(EnergyError::ExceedsCapacity {
                        amount,
                        free: *max_power,
                    });
                }
                assembly.apply_energy(amount);
                Ok(())
            }
            SegmentState::Io(io) => io.insert_from_world(amount, waveform, speed),
        }
    }

    // -- Interaction and overload -------------------------------------------

    /// Hammer interaction on `face` of the block at `local_offset` (both in
    /// this segment's frame).
    pub fn interact(&mut self, face: Facing, local_offset: BlockPos, actor: Actor, tool: Tool) -> InteractResult {
        if tool != Tool::Hammer {
            return InteractResult::NotHandled;
        }
        let SegmentState::Io(io) = &mut self.state else {
            return InteractResult::NotHandled;
        };
        let target = BlockFace::new(local_offset, face);
        if !io.routing().is_declared(&target) {
            return InteractResult::NotHandled;
        }
        if !actor.authoritative {
            return InteractResult::HandledNoUpdate;
        }
        io.routing_mut().cycle(&target);
        InteractResult::HandledUpdate
    }

    pub fn is_overloaded(&self, speed: f64) -> bool {
        self.max_speed.is_some_and(|max| speed > max)
    }

    /// Failure hook run when the assembly spins faster than `max_speed`.
    pub fn on_overload(&mut self) -> OverloadOutcome {
        match self.kind {
            SegmentKind::Flywheel => OverloadOutcome::Destroyed,
            _ => OverloadOutcome::Ignored,
        }
    }
}
