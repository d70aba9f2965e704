// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotdeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Artifact {coordinate} not found (searched: {searched})")]
    ResolutionError { coordinate: String, searched: String },

    #[error("Overlay unpack error: {0}")]
    UnpackError(String),

    #[error("Application not found: {0}")]
    AppNotFound(String),

    #[error("Application already registered: {0}")]
    DuplicateApp(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HotdeployError>;
