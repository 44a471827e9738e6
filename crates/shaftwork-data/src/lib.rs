//! Configuration loading for the shaft subsystem.
//!
//! A `shaftwork.ron`, `shaftwork.toml` or `shaftwork.json` file tunes the
//! energy conversion ratio, friction, structure length limit, and the
//! standard segment table. See [`schema::MechConfigData`] for the fields.

pub mod config;
pub mod loader;
pub mod schema;

pub use config::{CONFIG_BASE_NAME, MechConfig, load_mech_config, load_mech_config_dir, resolve_config};
pub use loader::{DataLoadError, Format, deserialize_file, detect_format, find_data_file};
