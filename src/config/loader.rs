// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, ConfigOverrides, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to get
/// a checked [`ConfigFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, validate and rebase a configuration file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    load_with_overrides(path, &ConfigOverrides::default())
}

/// Like [`load_and_validate`], with command-line values applied on top of
/// the file before validation.
///
/// Relative paths in the result are resolved against the config file's
/// directory.
pub fn load_with_overrides(path: impl AsRef<Path>, overrides: &ConfigOverrides) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    raw_config.apply_overrides(overrides);
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config.rebase(&config_root_dir(path)))
}

/// `Hotdeploy.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Hotdeploy.toml")
}

/// Directory that relative config paths are resolved against.
///
/// A bare filename like `Hotdeploy.toml` has an empty parent; the current
/// working directory is used then.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
