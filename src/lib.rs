//! vibe-validate - content-addressed command cache for git repositories
//!
//! Fingerprints the working tree through a private shadow index, keys
//! command results by that fingerprint, and stores them as git notes so an
//! unchanged tree never runs the same command twice.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod history;
pub mod runner;
pub mod ui;
pub mod vcs;

pub use error::{VibeError, VibeResult};
