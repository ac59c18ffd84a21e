//! Indexbars Runner: run configuration, pipelines, artifact persistence.
//!
//! This crate builds on `indexbars-core` to provide:
//! - TOML run configuration with validation
//! - The constituent prices pipeline (CSV output)
//! - The index series pipeline (JSON document output)
//! - The combined run, persisted all-or-nothing
//! - Atomic artifact writes with BLAKE3 content hashes

pub mod artifacts;
pub mod config;
pub mod pipeline;

pub use artifacts::Artifact;
pub use config::{require_token, ConfigError, ProviderConfig, RunConfig, TOKEN_ENV_VAR};
pub use pipeline::{CombinedSummary, Pipeline, RunError, RunSummary};
