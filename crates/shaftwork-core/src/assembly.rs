//! Shared rotational state of one formed structure.
//!
//! Every segment of a structure observes the same [`RotatingAssembly`]
//! through an [`AssemblyId`](crate::id::AssemblyId) handle. Total inertia is
//! fixed at formation: it is the sum of the segments' inertia and is never
//! changed afterwards.
//!
//! # Speed integration
//!
//! The assembly stores its angular speed `ω`. Its kinetic energy is
//! `E = ½·I·ω²`. Applying an energy delta `ΔE` sets
//! `ω' = sqrt(2·max(E + ΔE, 0) / I)`, so the same energy accelerates a
//! heavier assembly less. Lossy assemblies shed a fraction of their energy
//! each tick.

use serde::{Deserialize, Serialize};

/// Rotational state shared by all segments of one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatingAssembly {
    speed: f64,
    total_inertia: f64,
    is_lossless: bool,
}

impl RotatingAssembly {
    /// Build an assembly from the inertia contributions of its segments.
    /// The assembly starts at rest.
    pub fn from_inertias<I>(inertias: I, is_lossless: bool) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let total_inertia = inertias.into_iter().fold(0.0, |acc, i| acc + i);
        Self {
            speed: 0.0,
            total_inertia,
            is_lossless,
        }
    }

    /// Restore a previously saved assembly.
    pub fn restore(speed: f64, total_inertia: f64, is_lossless: bool) -> Self {
        Self {
            speed,
            total_inertia,
            is_lossless,
        }
    }

    /// Angular speed (radians per second).
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn total_inertia(&self) -> f64 {
        self.total_inertia
    }

    pub fn is_lossless(&self) -> bool {
        self.is_lossless
    }

    /// Kinetic energy `½·I·ω²` in joules.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.total_inertia * self.speed * self.speed
    }

    /// Add (positive) or remove (negative) rotational energy.
    ///
    /// Removal is capped at the stored energy. Returns the energy actually
    /// applied.
    pub fn apply_energy(&mut self, delta: f64) -> f64 {
        if self.total_inertia <= 0.0 || delta == 0.0 {
            return 0.0;
        }
        let before = self.kinetic_energy();
        let after = (before + delta).max(0.0);
        self.speed = (2.0 * after / self.total_inertia).sqrt();
        after - before
    }

    /// Shed `fraction` of the stored energy to bearing friction. Lossless
    /// assemblies are unaffected. Returns the energy lost.
    pub fn apply_friction(&mut self, fraction: f64) -> f64 {
        if self.is_lossless || fraction <= 0.0 {
            return 0.0;
        }
        let loss = self.kinetic_energy() * fraction.min(1.0);
        -self.apply_energy(-loss)
    }

    /// Overwrite the speed directly. Used when restoring state and by test
    /// harnesses that need a shaft already spinning.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
    }
}
