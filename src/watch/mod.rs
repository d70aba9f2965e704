// src/watch/mod.rs

//! Change detection by polling.
//!
//! This module is responsible for:
//! - Assembling the set of paths whose mutation must trigger a redeploy
//!   ([`builder`]).
//! - Fingerprinting those paths by size and mtime, optionally by content
//!   digest ([`fingerprint`]).
//! - Periodic scanning with a settle period before a batch of changes is
//!   handed to the orchestrator ([`scanner`]).
//!
//! It does **not** know how applications are redeployed; it only turns
//! filesystem differences into per-application change batches.

pub mod batch;
pub mod builder;
pub mod fingerprint;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod scanner;
pub mod target;

pub use batch::{Change, ChangeBatch, ChangeKind};
pub use builder::{ClassDir, WatchInputs, WatchSetBuilder};
pub use fingerprint::{diff, Fingerprint, FingerprintStore, Snapshot};
pub use patterns::{PathFilter, ScanPattern};
pub use scanner::{spawn_scanner, ScanCore, ScanPhase, ScannerConfig, ScannerHandle, ScannerState};
pub use target::{TargetKind, WatchSet, WatchTarget, DEFAULT_MAX_DEPTH};
