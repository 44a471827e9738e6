//! Fixed linear scale between internal energy (joules) and the external
//! world's integer energy units.

use serde::{Deserialize, Serialize};

/// Errors from building a conversion ratio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("conversion ratio must be finite and positive, got {0}")]
    InvalidRatio(f64),
}

/// Conversion between internal energy and external units. Configured once at
/// startup and constant afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct EnergyConversion {
    units_per_internal: f64,
}

impl Default for EnergyConversion {
    /// One external unit per four joules.
    fn default() -> Self {
        Self {
            units_per_internal: 0.25,
        }
    }
}

impl EnergyConversion {
    pub fn new(units_per_internal: f64) -> Result<Self, ConversionError> {
        if !units_per_internal.is_finite() || units_per_internal <= 0.0 {
            return Err(ConversionError::InvalidRatio(units_per_internal));
        }
        Ok(Self { units_per_internal })
    }

    pub fn units_per_internal(&self) -> f64 {
        self.units_per_internal
    }

    pub fn internal_per_unit(&self) -> f64 {
        1.0 / self.units_per_internal
    }

    /// Whole external units that `internal` joules are worth (rounded down).
    /// Never worth more than `internal`.
    pub fn whole_units(&self, internal: f64) -> u64 {
        let units = internal * self.units_per_internal;
        if units <= 0.0 { 0 } else { units.floor() as u64 }
    }

    /// Joules represented by `units` external units.
    pub fn to_internal(&self, units: u64) -> f64 {
        units as f64 * self.internal_per_unit()
    }
}

impl TryFrom<f64> for EnergyConversion {
    type Error = ConversionError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<EnergyConversion> for f64 {
    fn from(c: EnergyConversion) -> f64 {
        c.units_per_internal
    }
}
