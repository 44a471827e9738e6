use std::fs;
use std::path::{Path, PathBuf};

use shaftwork_data::{DataLoadError, load_mech_config, load_mech_config_dir};
use shaftwork_mech::catalog::SegmentKind;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shaftwork_load_{suffix}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn same_config_in_every_format() {
    let dir = make_test_dir("formats");
    let ron = dir.join("a.ron");
    let toml = dir.join("b.toml");
    let json = dir.join("c.json");
    fs::write(
        &ron,
        r#"(friction_per_tick: 0.002, segments: [(kind: "four_coils", max_power: Some(9000.0))])"#,
    )
    .unwrap();
    fs::write(
        &toml,
        "friction_per_tick = 0.002\n\n[[segments]]\nkind = \"four_coils\"\nmax_power = 9000.0\n",
    )
    .unwrap();
    fs::write(
        &json,
        r#"{"friction_per_tick": 0.002, "segments": [{"kind": "four_coils", "max_power": 9000.0}]}"#,
    )
    .unwrap();

    let configs: Vec<_> = [&ron, &toml, &json]
        .into_iter()
        .map(|p| load_mech_config(p).unwrap())
        .collect();
    for config in &configs {
        assert_eq!(config.settings, configs[0].settings);
        assert_eq!(
            config.catalog.spec(SegmentKind::FourCoils),
            configs[0].catalog.spec(SegmentKind::FourCoils)
        );
        assert_eq!(config.settings.friction_per_tick, 0.002);
    }
    cleanup(&dir);
}

#[test]
fn directory_lookup_uses_base_name() {
    let dir = make_test_dir("dir");
    fs::write(dir.join("shaftwork.toml"), "max_segments = 4\n").unwrap();
    let config = load_mech_config_dir(&dir).unwrap();
    assert_eq!(config.settings.max_segments, 4);
    assert_eq!(config.into_module().settings().max_segments, 4);
    cleanup(&dir);
}

#[test]
fn conflicting_files_are_rejected() {
    let dir = make_test_dir("conflict");
    fs::write(dir.join("shaftwork.toml"), "").unwrap();
    fs::write(dir.join("shaftwork.json"), "{}").unwrap();
    assert!(matches!(
        load_mech_config_dir(&dir),
        Err(DataLoadError::ConflictingFormats { .. })
    ));
    cleanup(&dir);
}

#[test]
fn missing_file_is_io_error() {
    let dir = make_test_dir("missing");
    assert!(matches!(
        load_mech_config(&dir.join("nope.ron")),
        Err(DataLoadError::Io(_))
    ));
    cleanup(&dir);
}
