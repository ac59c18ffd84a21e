//! Run pipelines: constituent prices, index series, and both together.
//!
//! Three entry points:
//! - `Pipeline::prices()`: resolve → plan → fetch → merge → CSV
//! - `Pipeline::index()`: plan (one symbol) → fetch index bars → format → JSON
//! - `Pipeline::all()`: both assembled in memory, persisted only if both succeed

use chrono::NaiveDate;
use indexbars_core::data::{
    format_series, index_file_name, merge, plan, prices_file_name, previous_month, BarKind,
    BatchFetcher, ConstituentResolver, ConstituentSource, DataProvider, DateRange, FetchProgress,
    IngestError, Stage, SymbolSet,
};
use std::path::PathBuf;
use thiserror::Error;

use crate::artifacts::{self, Artifact};
use crate::config::{ConfigError, RunConfig};

/// Errors from a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to write {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

impl RunError {
    /// Stage the run stopped in; `None` when the data was complete but could not be saved.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RunError::Config(_) => Some(Stage::Config),
            RunError::Ingest(e) => Some(e.stage()),
            RunError::Persist { .. } => None,
        }
    }
}

/// Summary of one persisted output.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub symbols: usize,
    pub windows: usize,
    /// Set for the constituent prices output only.
    pub source: Option<ConstituentSource>,
    pub content_hash: String,
}

/// Outcome of [`Pipeline::all`].
#[derive(Debug, Clone)]
pub struct CombinedSummary {
    pub prices: RunSummary,
    pub index: RunSummary,
}

/// A rendered output plus the counts that describe it.
struct Assembled {
    artifact: Artifact,
    rows: usize,
    symbols: usize,
    windows: usize,
    source: Option<ConstituentSource>,
}

impl Assembled {
    fn persist(self) -> Result<RunSummary, RunError> {
        artifacts::persist(&self.artifact)?;
        Ok(self.summary())
    }

    fn summary(self) -> RunSummary {
        RunSummary {
            content_hash: self.artifact.content_hash(),
            path: self.artifact.path,
            rows: self.rows,
            symbols: self.symbols,
            windows: self.windows,
            source: self.source,
        }
    }
}

/// Drives a run against one provider.
pub struct Pipeline<'a> {
    provider: &'a dyn DataProvider,
    config: &'a RunConfig,
    progress: &'a dyn FetchProgress,
    today: NaiveDate,
}

impl<'a> Pipeline<'a> {
    /// `today` fills a missing end date and anchors the constituent as-of month.
    pub fn new(
        provider: &'a dyn DataProvider,
        config: &'a RunConfig,
        progress: &'a dyn FetchProgress,
        today: NaiveDate,
    ) -> Self {
        Self {
            provider,
            config,
            progress,
            today,
        }
    }

    pub fn prices(&self) -> Result<RunSummary, RunError> {
        let range = self.config.validate(self.today)?;
        self.assemble_prices(&range)?.persist()
    }

    pub fn index(&self) -> Result<RunSummary, RunError> {
        let range = self.config.validate(self.today)?;
        self.assemble_index(&range)?.persist()
    }

    /// Both outputs are assembled first, then written together or not at all.
    pub fn all(&self) -> Result<CombinedSummary, RunError> {
        let range = self.config.validate(self.today)?;
        let prices = self.assemble_prices(&range)?;
        let index = self.assemble_index(&range)?;

        artifacts::persist_all(&[&prices.artifact, &index.artifact])?;
        Ok(CombinedSummary {
            prices: prices.summary(),
            index: index.summary(),
        })
    }

    fn output_path(&self, file_name: String) -> PathBuf {
        self.config.output_dir.join(file_name)
    }

    fn assemble_prices(&self, range: &DateRange) -> Result<Assembled, RunError> {
        let cfg = self.config;
        let as_of = previous_month(self.today);
        let resolved = ConstituentResolver::new(self.provider).resolve(
            &cfg.index_code,
            &as_of,
            cfg.fallback_snapshot.as_deref(),
        )?;

        let windows = plan(range, resolved.symbols.len(), cfg.row_budget)?;
        tracing::info!(
            symbols = resolved.symbols.len(),
            windows = windows.len(),
            range = %range,
            "planned constituent price requests"
        );

        let batches = BatchFetcher::new(self.provider, BarKind::Equity).fetch_all(
            &resolved.symbols,
            &windows,
            self.progress,
        )?;
        let merged = merge(batches)?;

        let path = self.output_path(prices_file_name(&cfg.stem()));
        let artifact = artifacts::render_prices_csv(merged.rows(), path)?;

        Ok(Assembled {
            artifact,
            rows: merged.len(),
            symbols: merged.symbol_count(),
            windows: windows.len(),
            source: Some(resolved.source),
        })
    }

    fn assemble_index(&self, range: &DateRange) -> Result<Assembled, RunError> {
        let cfg = self.config;
        let symbols = SymbolSet::from_ordered([cfg.index_code.as_str()]);
        let windows = plan(range, symbols.len(), cfg.row_budget)?;
        tracing::info!(
            index_code = %cfg.index_code,
            windows = windows.len(),
            range = %range,
            "planned index series requests"
        );

        let batches = BatchFetcher::new(self.provider, BarKind::Index).fetch_all(
            &symbols,
            &windows,
            self.progress,
        )?;
        let merged = merge(batches)?;
        let doc = format_series(merged.rows(), &cfg.index_code, &cfg.document)?;

        let path = self.output_path(index_file_name(&cfg.stem()));
        let artifact = artifacts::render_index_json(&doc, path)?;

        Ok(Assembled {
            artifact,
            rows: doc.series.len(),
            symbols: 1,
            windows: windows.len(),
            source: None,
        })
    }
}
