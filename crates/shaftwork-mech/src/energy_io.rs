//! Energy buffers and the speed-gated transformation between a segment's
//! two ports.
//!
//! An electrical I/O segment holds two [`EnergyBuffer`]s:
//!
//! - **to assembly**: energy received from the world, waiting to be handed to
//!   the shaft's electrical bus.
//! - **to world**: energy taken from the bus, waiting to leave through the
//!   segment's OUTPUT faces.
//!
//! A [`TransformLimit`] scales how much of the to-assembly buffer is
//! convertible at the current speed, and a [`Transform`] rewrites waveforms
//! crossing the segment (commutators rectify and chop).
//!
//! Misuse is rejected: extracting more than is available or inserting more
//! than fits returns an [`EnergyError`] and leaves both buffers untouched.

use serde::{Deserialize, Serialize};
use shaftwork_core::conversion::EnergyConversion;
use shaftwork_core::geometry::LocalFrame;
use shaftwork_core::waveform::{Phases, Source, WaveKind, Waveform};
use shaftwork_core::world::World;

use crate::routing::{BlockFace, FaceMode, SideRouting};

/// Relative slack allowed when comparing a request against availability.
const TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Hermite smoothstep between `min` and `max`.
///
/// Ascending when `min < max`: 0 at or below `min`, 1 at or above `max`.
/// When `min > max` the ramp descends and equals `1 - ramp(max, min, speed)`.
pub fn ramp(min: f64, max: f64, speed: f64) -> f64 {
    if max < min {
        return 1.0 - ramp(max, min, speed);
    }
    if speed <= min {
        return 0.0;
    }
    if speed >= max {
        return 1.0;
    }
    let d = max - min;
    let s = speed - min;
    (s * s * (1.0 / (d * d) - 2.0 / (d * d * d) * (speed - max))).clamp(0.0, 1.0)
}

/// Fraction of buffered energy convertible at a given speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformLimit {
    Unity,
    Ramp { min: f64, max: f64 },
}

impl TransformLimit {
    pub fn factor(&self, speed: f64) -> f64 {
        match *self {
            TransformLimit::Unity => 1.0,
            TransformLimit::Ramp { min, max } => ramp(min, max, speed),
        }
    }
}

/// Waveform rewrite applied to energy crossing a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    Identity,
    Commutate,
}

impl Transform {
    pub fn apply(self, waveform: Waveform, speed: f64, multi_phase: bool) -> Waveform {
        match self {
            Transform::Identity => waveform,
            Transform::Commutate => waveform.commutated(speed, multi_phase),
        }
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Errors from buffer operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnergyError {
    #[error("energy amount must be finite and non-negative, got {0}")]
    InvalidAmount(f64),
    #[error("requested {requested} J but only {available} J is available")]
    ExceedsAvailable { requested: f64, available: f64 },
    #[error("inserting {amount} J exceeds the {free} J of free capacity")]
    ExceedsCapacity { amount: f64, free: f64 },
    #[error("segment does not exchange energy with the bus")]
    NotElectrical,
}

/// Stored energy plus the waveform describing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBuffer {
    amount: f64,
    capacity: f64,
    tag: Waveform,
}

impl EnergyBuffer {
    pub fn empty(capacity: f64, tag: Waveform) -> Self {
        Self {
            amount: 0.0,
            capacity,
            tag,
        }
    }

    /// Restore a saved buffer. Returns `None` if `amount` lies outside
    /// `0..=capacity`.
    pub fn restore(capacity: f64, amount: f64, tag: Waveform) -> Option<Self> {
        if !(0.0..=capacity).contains(&amount) {
            return None;
        }
        Some(Self {
            amount,
            capacity,
            tag,
        })
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn free(&self) -> f64 {
        (self.capacity - self.amount).max(0.0)
    }

    pub fn tag(&self) -> Waveform {
        self.tag
    }
}

fn check_amount(amount: f64) -> Result<(), EnergyError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(EnergyError::InvalidAmount(amount))
    }
}

// ---------------------------------------------------------------------------
// Energy I/O
// ---------------------------------------------------------------------------

/// Static parameters of an I/O segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoProfile {
    pub capacity: f64,
    pub transform: Transform,
    pub limit: TransformLimit,
    pub multi_phase: bool,
    /// Kind of energy exchanged with the world.
    pub external_kind: WaveKind,
}

impl IoProfile {
    fn phases(&self) -> Phases {
        Phases::from_multi(self.multi_phase)
    }
}

/// Buffers and routing of one electrical I/O segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyIo {
    profile: IoProfile,
    to_assembly: EnergyBuffer,
    to_world: EnergyBuffer,
    routing: SideRouting,
}

impl EnergyIo {
    /// Empty buffers, every connection face routed `None`.
    pub fn new(profile: IoProfile, connections: &[BlockFace]) -> Self {
        let idle = Waveform::none(profile.phases());
        Self {
            profile,
            to_assembly: EnergyBuffer::empty(profile.capacity, idle),
            to_world: EnergyBuffer::empty(profile.capacity, idle),
            routing: SideRouting::new(connections),
        }
    }

    /// Reassemble from saved parts.
    pub fn from_parts(
        profile: IoProfile,
        to_assembly: EnergyBuffer,
        to_world: EnergyBuffer,
        routing: SideRouting,
    ) -> Self {
        Self {
            profile,
            to_assembly,
            to_world,
            routing,
        }
    }

    pub fn profile(&self) -> &IoProfile {
        &self.profile
    }

    pub fn to_assembly(&self) -> &EnergyBuffer {
        &self.to_assembly
    }

    pub fn to_world(&self) -> &EnergyBuffer {
        &self.to_world
    }

    pub fn routing(&self) -> &SideRouting {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut SideRouting {
        &mut self.routing
    }

    pub fn limit(&self, speed: f64) -> f64 {
        self.profile.limit.factor(speed)
    }

    /// Waveform the to-assembly buffer presents to the bus at `speed`.
    pub fn produced_waveform(&self, speed: f64) -> Waveform {
        self.profile
            .transform
            .apply(self.to_assembly.tag, speed, self.profile.multi_phase)
    }

    /// Energy the bus may take right now. Read-only.
    pub fn available_to_assembly(&self, speed: f64) -> f64 {
        self.to_assembly.amount * self.limit(speed)
    }

    /// Take `amount` joules for the bus, draining `amount / L(speed)` from
    /// the to-assembly buffer.
    pub fn extract_to_assembly(&mut self, amount: f64, speed: f64) -> Result<(), EnergyError> {
        check_amount(amount)?;
        if amount == 0.0 {
            return Ok(());
        }
        let available = self.available_to_assembly(speed);
        if amount > available * (1.0 + TOLERANCE) {
            return Err(EnergyError::ExceedsAvailable {
                requested: amount,
                available,
            });
        }
        let drained = (amount / self.limit(speed)).min(self.to_assembly.amount);
        self.to_assembly.amount = (self.to_assembly.amount - drained).max(0.0);
        Ok(())
    }

    /// Free to-world capacity offered to a bus carrying `waveform`.
    ///
    /// Zero when the waveform, once transformed, does not match this
    /// segment's phase capability.
    pub fn request_capacity(&self, waveform: Waveform, speed: f64) -> f64 {
        let transformed = self
            .profile
            .transform
            .apply(waveform, speed, self.profile.multi_phase);
        if transformed.is_none() || self.profile.multi_phase == transformed.is_single_phase() {
            return 0.0;
        }
        self.to_world.free() * self.limit(speed)
    }

    /// Accept `amount` joules of `waveform` from the bus into the to-world
    /// buffer, retagging it with the transformed waveform.
    pub fn insert_from_world(&mut self, amount: f64, waveform: Waveform, speed: f64) -> Result<(), EnergyError> {
        check_amount(amount)?;
        let free = self.to_world.free();
        if amount > free * (1.0 + TOLERANCE) {
            return Err(EnergyError::ExceedsCapacity { amount, free });
        }
        if amount == 0.0 {
            return Ok(());
        }
        self.to_world.tag = self
            .profile
            .transform
            .apply(waveform, speed, self.profile.multi_phase);
        self.to_world.amount = (self.to_world.amount + amount).min(self.to_world.capacity);
        Ok(())
    }

    /// Offer to-world energy to the neighbours of OUTPUT faces, in
    /// declaration order. Only AC is pushed; DC waits for
    /// [`extract_external`](Self::extract_external).
    ///
    /// Returns the number of units delivered.
    pub fn push_to_world<W>(&mut self, world: &mut W, frame: &LocalFrame, conversion: &EnergyConversion) -> u64
    where
        W: World + ?Sized,
    {
        if !self.to_world.tag.is_ac() {
            return 0;
        }
        let connections = self.routing.connection_count();
        if connections == 0 {
            return 0;
        }
        let per_tick = self.to_world.amount.min(self.to_world.capacity / connections as f64);
        let mut budget = conversion.whole_units(per_tick);
        let mut delivered = 0;
        for face in self.routing.outputs() {
            if budget == 0 {
                break;
            }
            let facing = frame.to_real_facing(face.face);
            let target = frame.to_real(face.offset).offset(facing);
            let accepted = world.offer_energy(target, facing.opposite(), budget).min(budget);
            budget -= accepted;
            delivered += accepted;
        }
        if delivered > 0 {
            self.to_world.amount = (self.to_world.amount - conversion.to_internal(delivered)).max(0.0);
        }
        delivered
    }

    /// A neighbour pushes `units` into `face`. Only INPUT faces accept.
    /// Stored energy of a different kind than this segment takes from the
    /// world is discarded first.
    ///
    /// Returns the units accepted (or that would be, when `simulate`).
    pub fn receive_external(
        &mut self,
        face: &BlockFace,
        units: u64,
        simulate: bool,
        conversion: &EnergyConversion,
    ) -> u64 {
        if self.routing.mode(face) != FaceMode::Input {
            return 0;
        }
        let stale = self.to_assembly.tag.kind != self.profile.external_kind;
        let stored = if stale { 0.0 } else { self.to_assembly.amount };
        let free = (self.to_assembly.capacity - stored).max(0.0);
        let accepted = units.min(conversion.whole_units(free));
        if !simulate && accepted > 0 {
            let amount = stored + conversion.to_internal(accepted);
            self.to_assembly.amount = amount.min(self.to_assembly.capacity);
            self.to_assembly.tag = Waveform::new(
                self.profile.external_kind,
                self.profile.phases(),
                Source::External,
            );
        }
        accepted
    }

    /// A neighbour network carrying `kind` pulls up to `units` from `face`.
    /// Only OUTPUT faces give, and only energy of the same kind.
    pub fn extract_external(
        &mut self,
        face: &BlockFace,
        units: u64,
        kind: WaveKind,
        simulate: bool,
        conversion: &EnergyConversion,
    ) -> u64 {
        if self.routing.mode(face) != FaceMode::Output
            || kind == WaveKind::None
            || self.to_world.tag.kind != kind
        {
            return 0;
        }
        let extracted = units.min(conversion.whole_units(self.to_world.amount));
        if !simulate && extracted > 0 {
            self.to_world.amount = (self.to_world.amount - conversion.to_internal(extracted)).max(0.0);
        }
        extracted
    }
}
