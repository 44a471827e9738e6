//! Serde-deserializable configuration schema.
//!
//! These types mirror what a user writes in `shaftwork.ron` / `.toml` /
//! `.json`. Segment kinds are referenced by snake_case name and resolved
//! into a [`Catalog`](shaftwork_mech::catalog::Catalog) by the config
//! module.

use serde::Deserialize;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MechConfigData {
    /// External units per joule.
    pub units_per_internal: f64,
    /// Fraction of kinetic energy lossy assemblies shed each tick.
    pub friction_per_tick: f64,
    /// When false, neither commutator kind can form.
    pub allow_commutators: bool,
    /// Longest structure the matcher scans.
    pub max_segments: usize,
    pub segments: Vec<SegmentOverrideData>,
}

impl Default for MechConfigData {
    fn default() -> Self {
        Self {
            units_per_internal: 0.25,
            friction_per_tick: 0.001,
            allow_commutators: true,
            max_segments: 32,
            segments: Vec::new(),
        }
    }
}

/// Per-kind adjustments applied on top of the standard segment table.
/// Unset fields keep the standard value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentOverrideData {
    pub kind: String,
    #[serde(default)]
    pub inertia: Option<f64>,
    /// Buffer capacity of an I/O segment, in joules.
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Per-tick conversion limit of a coil, in joules.
    #[serde(default)]
    pub max_power: Option<f64>,
    /// Overload threshold, in radians per second.
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}
