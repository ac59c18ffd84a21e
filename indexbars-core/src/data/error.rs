//! Run-level error taxonomy.
//!
//! Every failure that aborts a run is one of four kinds: bad input, no
//! constituents, provider fault, or nothing to operate on. Each carries the
//! [`Stage`] it happened in so the CLI can say where the run stopped.

use super::provider::DataError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage, reported alongside every [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Constituents,
    Planning,
    Fetch,
    Merge,
    Format,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Constituents => "constituents",
            Stage::Planning => "planning",
            Stage::Fetch => "fetch",
            Stage::Merge => "merge",
            Stage::Format => "format",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Rejected before any provider call.
    #[error("invalid input at {stage} stage: {reason}")]
    InvalidInput { stage: Stage, reason: String },

    #[error("no constituents for index '{index_code}': {reason}")]
    NoData { index_code: String, reason: String },

    #[error("provider failed at {stage} stage: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: DataError,
    },

    #[error("empty result at {stage} stage: {reason}")]
    EmptyResult { stage: Stage, reason: String },
}

impl IngestError {
    pub fn invalid(stage: Stage, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage,
            reason: reason.into(),
        }
    }

    pub fn empty(stage: Stage, reason: impl Into<String>) -> Self {
        Self::EmptyResult {
            stage,
            reason: reason.into(),
        }
    }

    /// The stage the run stopped in.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidInput { stage, .. }
            | Self::Provider { stage, .. }
            | Self::EmptyResult { stage, .. } => *stage,
            Self::NoData { .. } => Stage::Constituents,
        }
    }
}
