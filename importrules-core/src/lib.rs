//! Core shared library for the import rules workspace.
//!
//! This crate exposes the primitives every other crate depends on: the
//! canonical error type, configuration loading and logging setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{EngineConfig, Environment};
pub use errors::{ConfigError, CoreError, Result as CoreResult};
