//! Index constituent resolution with snapshot fallback.
//!
//! Resolution policy:
//! 1. Live constituent listing from the provider, if non-empty → use it
//! 2. Otherwise, a saved snapshot CSV (`con_code` column), if one exists → use it, warn
//! 3. Otherwise → fail with [`IngestError::NoData`]

use super::error::{IngestError, Stage};
use super::provider::DataProvider;
use super::window::DateRange;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Ordered, duplicate-free list of security identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolSet {
    symbols: Vec<String>,
}

impl SymbolSet {
    /// Keeps the first occurrence of each symbol, in input order.
    pub fn from_ordered<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.symbols
    }

    /// Comma-joined form used as a single query parameter.
    pub fn joined(&self) -> String {
        self.symbols.join(",")
    }
}

/// Where a resolved symbol set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstituentSource {
    Live,
    Snapshot(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ResolvedConstituents {
    pub symbols: SymbolSet,
    pub source: ConstituentSource,
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    con_code: String,
}

/// Read the `con_code` column of a saved constituent snapshot.
///
/// Other columns (weights, dates) are ignored.
pub fn load_snapshot(path: &Path) -> Result<SymbolSet, String> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| format!("open snapshot {}: {e}", path.display()))?;

    let mut codes = Vec::new();
    for row in reader.deserialize::<SnapshotRow>() {
        let row = row.map_err(|e| format!("read snapshot {}: {e}", path.display()))?;
        codes.push(row.con_code.trim().to_string());
    }

    Ok(SymbolSet::from_ordered(codes))
}

/// Resolves the symbol set of an index through a provider.
pub struct ConstituentResolver<'a> {
    provider: &'a dyn DataProvider,
}

impl<'a> ConstituentResolver<'a> {
    pub fn new(provider: &'a dyn DataProvider) -> Self {
        Self { provider }
    }

    /// Resolve constituents of `index_code` published within `as_of`.
    ///
    /// A provider fault is not masked by the snapshot: only an empty live
    /// result falls back.
    pub fn resolve(
        &self,
        index_code: &str,
        as_of: &DateRange,
        fallback: Option<&Path>,
    ) -> Result<ResolvedConstituents, IngestError> {
        let records = self
            .provider
            .fetch_constituents(index_code, as_of.start(), as_of.end())
            .map_err(|source| IngestError::Provider {
                stage: Stage::Constituents,
                source,
            })?;

        let live = SymbolSet::from_ordered(records.into_iter().map(|r| r.con_code));
        if !live.is_empty() {
            tracing::info!(
                index_code,
                symbols = live.len(),
                as_of = %as_of,
                "resolved constituents from {}",
                self.provider.name()
            );
            return Ok(ResolvedConstituents {
                symbols: live,
                source: ConstituentSource::Live,
            });
        }

        let no_data = |reason: String| IngestError::NoData {
            index_code: index_code.to_string(),
            reason,
        };

        let path = match fallback {
            Some(p) if p.exists() => p,
            Some(p) => {
                return Err(no_data(format!(
                    "live query for {as_of} was empty and snapshot {} does not exist",
                    p.display()
                )))
            }
            None => {
                return Err(no_data(format!(
                    "live query for {as_of} was empty and no snapshot was configured"
                )))
            }
        };

        tracing::warn!(
            index_code,
            snapshot = %path.display(),
            "live constituent query returned no rows, falling back to snapshot"
        );

        let symbols = load_snapshot(path).map_err(no_data)?;
        if symbols.is_empty() {
            return Err(no_data(format!(
                "snapshot {} lists no constituents",
                path.display()
            )));
        }

        Ok(ResolvedConstituents {
            symbols,
            source: ConstituentSource::Snapshot(path.to_path_buf()),
        })
    }
}
