//! Run configuration, loaded from TOML and overridden by CLI flags.

use chrono::NaiveDate;
use indexbars_core::data::{
    parse_compact_date, DateRange, DocumentMeta, IngestError, Stage, DEFAULT_ROW_BUDGET,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the provider token.
pub const TOKEN_ENV_VAR: &str = "TUSHARE_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config TOML: {0}")]
    Parse(String),

    #[error(transparent)]
    Invalid(#[from] IngestError),
}

/// Everything a run needs besides the credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub index_code: String,
    /// `YYYYMMDD`, inclusive.
    pub start_date: String,
    /// `YYYYMMDD`, inclusive. Today when absent.
    pub end_date: Option<String>,
    /// Max rows per provider call.
    pub row_budget: usize,
    pub output_dir: PathBuf,
    /// Constituent CSV used when the live listing is empty.
    pub fallback_snapshot: Option<PathBuf>,
    /// Overrides the stem derived from `index_code`.
    pub output_stem: Option<String>,
    pub document: DocumentMeta,
    pub provider: ProviderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            index_code: "000016.SH".into(),
            start_date: "20250101".into(),
            end_date: None,
            row_budget: DEFAULT_ROW_BUDGET,
            output_dir: PathBuf::from("data/A_stock"),
            fallback_snapshot: None,
            output_stem: None,
            document: DocumentMeta::default(),
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: indexbars_core::data::tushare::DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RunConfig {
    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every field and return the requested date range.
    ///
    /// `today` stands in for a missing `end_date`.
    pub fn validate(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        if self.index_code.trim().is_empty() {
            return Err(invalid("index_code must not be empty"));
        }
        if self.row_budget == 0 {
            return Err(invalid("row_budget must be at least 1"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(invalid("provider.timeout_secs must be at least 1"));
        }

        let start = parse_compact_date(&self.start_date)?;
        let end = match &self.end_date {
            Some(s) => parse_compact_date(s)?,
            None => today,
        };
        if start > end {
            return Err(invalid(format!(
                "start_date {} is after end_date {}",
                self.start_date,
                end.format("%Y%m%d")
            )));
        }

        DateRange::new(start, end).map_err(ConfigError::from)
    }

    /// File-name stem for this run's outputs.
    pub fn stem(&self) -> String {
        self.output_stem
            .clone()
            .unwrap_or_else(|| indexbars_core::data::output_stem(&self.index_code))
    }
}

/// Turn the raw environment value into a usable token.
pub fn require_token(raw: Option<String>) -> Result<String, ConfigError> {
    match raw.map(|t| t.trim().to_string()) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(invalid(format!(
            "{TOKEN_ENV_VAR} is not set (export it or add it to .env)"
        ))),
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(IngestError::invalid(Stage::Config, reason))
}
