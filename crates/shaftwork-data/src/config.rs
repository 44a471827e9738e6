//! Resolution of [`MechConfigData`] into a validated catalog and settings.

use std::collections::BTreeSet;
use std::path::Path;

use shaftwork_core::conversion::EnergyConversion;
use shaftwork_mech::catalog::{Behavior, Catalog, CatalogBuilder, SegmentKind};
use shaftwork_mech::{MechSettings, ShaftModule};

use crate::loader::{DataLoadError, deserialize_file, find_data_file};
use crate::schema::{MechConfigData, SegmentOverrideData};

/// Base name of the configuration file inside a data directory.
pub const CONFIG_BASE_NAME: &str = "shaftwork";

/// A fully resolved configuration, ready to build a [`ShaftModule`].
#[derive(Debug, Clone)]
pub struct MechConfig {
    pub catalog: Catalog,
    pub settings: MechSettings,
}

impl Default for MechConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            settings: MechSettings::default(),
        }
    }
}

impl MechConfig {
    pub fn into_module(self) -> ShaftModule {
        ShaftModule::new(self.catalog, self.settings)
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load and resolve a single configuration file.
pub fn load_mech_config(path: &Path) -> Result<MechConfig, DataLoadError> {
    let data: MechConfigData = deserialize_file(path)?;
    resolve_config(&data, path)
}

/// Load `shaftwork.{ron,toml,json}` from `dir`. A directory without one
/// yields the standard configuration.
pub fn load_mech_config_dir(dir: &Path) -> Result<MechConfig, DataLoadError> {
    match find_data_file(dir, CONFIG_BASE_NAME)? {
        Some(path) => load_mech_config(&path),
        None => {
            tracing::debug!(dir = %dir.display(), "no shaftwork config found, using defaults");
            Ok(MechConfig::default())
        }
    }
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Validate `data` and apply its overrides to the standard segment table.
/// `file` only labels errors.
pub fn resolve_config(data: &MechConfigData, file: &Path) -> Result<MechConfig, DataLoadError> {
    let invalid = |detail: String| DataLoadError::Invalid {
        file: file.to_path_buf(),
        detail,
    };

    let conversion = EnergyConversion::new(data.units_per_internal).map_err(|e| invalid(e.to_string()))?;
    if !(0.0..=1.0).contains(&data.friction_per_tick) {
        return Err(invalid(format!(
            "friction_per_tick must lie in [0, 1], got {}",
            data.friction_per_tick
        )));
    }
    if data.max_segments == 0 {
        return Err(invalid("max_segments must be at least one".to_string()));
    }

    let mut builder = CatalogBuilder::standard();
    if !data.allow_commutators {
        builder
            .set_enabled(SegmentKind::Commutator, false)
            .set_enabled(SegmentKind::FourPhaseCommutator, false);
    }

    let mut seen = BTreeSet::new();
    for entry in &data.segments {
        let kind = SegmentKind::from_name(&entry.kind).ok_or_else(|| DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: entry.kind.clone(),
            expected_kind: "segment kind",
        })?;
        if !seen.insert(kind) {
            return Err(invalid(format!("segment '{}' overridden twice", entry.kind)));
        }
        apply_override(&mut builder, kind, entry).map_err(invalid)?;
    }

    let catalog = builder.build().map_err(|e| invalid(e.to_string()))?;
    tracing::debug!(
        file = %file.display(),
        overrides = data.segments.len(),
        "resolved shaftwork config"
    );
    Ok(MechConfig {
        catalog,
        settings: MechSettings {
            conversion,
            friction_per_tick: data.friction_per_tick,
            max_segments: data.max_segments,
        },
    })
}

fn apply_override(builder: &mut CatalogBuilder, kind: SegmentKind, entry: &SegmentOverrideData) -> Result<(), String> {
    let mut mismatch = None;
    builder.mutate(kind, |spec| {
        if let Some(inertia) = entry.inertia {
            spec.inertia = inertia;
        }
        if let Some(max_speed) = entry.max_speed {
            spec.max_speed = Some(max_speed);
        }
        if let Some(enabled) = entry.enabled {
            spec.enabled = enabled;
        }
        if let Some(value) = entry.capacity {
            match &mut spec.behavior {
                Behavior::Io { capacity, .. } => *capacity = value,
                _ => mismatch = Some("capacity"),
            }
        }
        if let Some(value) = entry.max_power {
            match &mut spec.behavior {
                Behavior::Coil { max_power } => *max_power = value,
                _ => mismatch = Some("max_power"),
            }
        }
    });
    match mismatch {
        Some(field) => Err(format!("segment '{}' has no {field}", entry.kind)),
        None => Ok(()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Format, deserialize_str};
    use std::path::PathBuf;

    fn resolve_ron(src: &str) -> Result<MechConfig, DataLoadError> {
        let file = Path::new("shaftwork.ron");
        let data: MechConfigData = deserialize_str(src, Format::Ron, file)?;
        resolve_config(&data, file)
    }

    #[test]
    fn defaults_match_standard_catalog() {
        let config = resolve_ron("()").unwrap();
        assert_eq!(config.settings, MechSettings::default());
        for kind in SegmentKind::ALL {
            assert_eq!(config.catalog.spec(kind), Catalog::default().spec(kind));
        }
    }

    #[test]
    fn overrides_reach_the_catalog() {
        let config = resolve_ron(
            r#"(
                units_per_internal: 0.5,
                max_segments: 8,
                segments: [
                    (kind: "flywheel", inertia: Some(5000.0), max_speed: Some(90.0)),
                    (kind: "electrodes", capacity: Some(20000.0)),
                    (kind: "single_coil", max_power: Some(1000.0)),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(config.settings.conversion.units_per_internal(), 0.5);
        assert_eq!(config.settings.max_segments, 8);

        let flywheel = config.catalog.spec(SegmentKind::Flywheel);
        assert_eq!(flywheel.inertia, 5000.0);
        assert_eq!(flywheel.max_speed, Some(90.0));
        assert!(matches!(
            config.catalog.spec(SegmentKind::Electrodes).behavior,
            Behavior::Io { capacity, .. } if capacity == 20000.0
        ));
        assert_eq!(
            config.catalog.spec(SegmentKind::SingleCoil).behavior,
            Behavior::Coil { max_power: 1000.0 }
        );
    }

    #[test]
    fn commutators_can_be_disabled() {
        let config = resolve_ron("(allow_commutators: false)").unwrap();
        assert!(!config.catalog.spec(SegmentKind::Commutator).enabled);
        assert!(!config.catalog.spec(SegmentKind::FourPhaseCommutator).enabled);
        assert!(config.catalog.spec(SegmentKind::Electrodes).enabled);
    }

    #[test]
    fn unknown_kind_is_unresolved() {
        let err = resolve_ron(r#"(segments: [(kind: "dynamo")])"#).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { ref name, .. } if name == "dynamo"
        ));
    }

    #[test]
    fn field_without_behavior_is_invalid() {
        let err = resolve_ron(r#"(segments: [(kind: "shaft", capacity: Some(10.0))])"#).unwrap_err();
        assert!(matches!(err, DataLoadError::Invalid { .. }));
        let err = resolve_ron(r#"(segments: [(kind: "electrodes", max_power: Some(10.0))])"#).unwrap_err();
        assert!(matches!(err, DataLoadError::Invalid { .. }));
    }

    #[test]
    fn duplicate_override_is_invalid() {
        let err = resolve_ron(r#"(segments: [(kind: "shaft"), (kind: "shaft")])"#).unwrap_err();
        assert!(matches!(err, DataLoadError::Invalid { .. }));
    }

    #[test]
    fn bad_settings_are_invalid() {
        for src in [
            "(units_per_internal: 0.0)",
            "(units_per_internal: -1.0)",
            "(friction_per_tick: 1.5)",
            "(max_segments: 0)",
            r#"(segments: [(kind: "flywheel", inertia: Some(-1.0))])"#,
            r#"(segments: [(kind: "electrodes", capacity: Some(0.0))])"#,
        ] {
            assert!(
                matches!(resolve_ron(src), Err(DataLoadError::Invalid { .. })),
                "{src} should be rejected"
            );
        }
    }

    #[test]
    fn missing_directory_file_uses_defaults() {
        let dir: PathBuf = std::env::temp_dir().join(format!("shaftwork_config_empty_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let config = load_mech_config_dir(&dir).unwrap();
        assert_eq!(config.settings, MechSettings::default());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
