//! # modelgen-cli
//!
//! CLI library for generating object-model modules from meta-model
//! documents.
//!
//! This crate provides the functionality behind the `modelgen` binary:
//! configuration, input loading, output and file watching. Generation
//! itself lives in the [`modelgen`] crate.
//!
//! ## Architecture
//!
//! - [`config`] - Configuration management and TOML parsing
//! - [`generator`] - Loading model, super models and overrides, then generating
//!   into memory or streaming to a writer
//! - [`writer`] - File output with dry-run support
//! - [`watcher`] - Regeneration when input files change
//! - [`error`] - Error types and handling

pub mod config;
pub mod error;
pub mod generator;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
pub use config::{Config, ConfigManager, SuperModelSpec};
pub use error::{CliError, CliResult};
pub use generator::ModuleGenerator;
pub use watcher::FileWatcher;
pub use writer::FileWriter;
