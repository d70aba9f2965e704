// src/config/mod.rs

//! Configuration loading and validation for hotdeploy.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate values and build the checked [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_with_overrides};
pub use model::{ConfigFile, ConfigOverrides, DeploySettings, RawConfigFile, ScanSettings};
