//! Merge windowed batches into one canonically ordered dataset.

use super::batch::RawBatch;
use super::error::{IngestError, Stage};
use super::provider::PriceRecord;
use std::collections::BTreeSet;

/// All rows of a run, sorted by (trade_date, symbol) with no duplicate keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    rows: Vec<PriceRecord>,
    duplicates_dropped: usize,
}

impl MergedDataset {
    pub fn rows(&self) -> &[PriceRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PriceRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows discarded because an earlier row had the same (trade_date, symbol).
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    /// Number of distinct symbols present.
    pub fn symbol_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Earliest and latest trade_date.
    pub fn date_span(&self) -> Option<(&str, &str)> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;
        Some((first.trade_date.as_str(), last.trade_date.as_str()))
    }
}

/// Canonicalize: concatenate, sort by (trade_date, symbol), dedupe.
///
/// The sort is stable, so for a repeated (trade_date, symbol) the row from the
/// earliest batch is kept. Values are not validated.
pub fn merge(batches: Vec<RawBatch>) -> Result<MergedDataset, IngestError> {
    let mut rows: Vec<PriceRecord> = batches.into_iter().flat_map(|b| b.records).collect();

    if rows.is_empty() {
        return Err(IngestError::empty(
            Stage::Merge,
            "no daily bars were returned for any window",
        ));
    }

    rows.sort_by(|a, b| {
        a.trade_date
            .cmp(&b.trade_date)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let before = rows.len();
    rows.dedup_by(|later, earlier| {
        later.trade_date == earlier.trade_date && later.symbol == earlier.symbol
    });
    let duplicates_dropped = before - rows.len();

    if duplicates_dropped > 0 {
        tracing::warn!(duplicates_dropped, "dropped duplicate (trade_date, symbol) rows");
    }

    Ok(MergedDataset {
        rows,
        duplicates_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::window::DateRange;
    use chrono::NaiveDate;

    fn record(symbol: &str, date: &str, close: f64) -> PriceRecord {
        PriceRecord {
            symbol: symbol.into(),
            trade_date: date.into(),
            open: close,
            high: close,
            low: close,
            close,
            pre_close: None,
            change: None,
            pct_change: None,
            volume: Some(1000.0),
            amount: None,
        }
    }

    fn batch(records: Vec<PriceRecord>) -> RawBatch {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        RawBatch {
            window: DateRange::new(day, day).unwrap(),
            records,
        }
    }

    #[test]
    fn sorts_by_date_then_symbol_across_batches() {
        let merged = merge(vec![
            batch(vec![
                record("601318.SH", "20250103", 1.0),
                record("600519.SH", "20250103", 2.0),
            ]),
            batch(vec![
                record("601318.SH", "20250102", 3.0),
                record("600519.SH", "20250102", 4.0),
            ]),
        ])
        .unwrap();

        let keys: Vec<(&str, &str)> = merged
            .rows()
            .iter()
            .map(|r| (r.trade_date.as_str(), r.symbol.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("20250102", "600519.SH"),
                ("20250102", "601318.SH"),
                ("20250103", "600519.SH"),
                ("20250103", "601318.SH"),
            ]
        );
        assert_eq!(merged.symbol_count(), 2);
        assert_eq!(merged.date_span(), Some(("20250102", "20250103")));
    }

    #[test]
    fn keeps_first_occurrence_of_duplicates() {
        let merged = merge(vec![
            batch(vec![record("600519.SH", "20250102", 100.0)]),
            batch(vec![record("600519.SH", "20250102", 200.0)]),
        ])
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.duplicates_dropped(), 1);
        assert_eq!(merged.rows()[0].close, 100.0);
    }

    #[test]
    fn empty_batches_are_an_empty_result() {
        let err = merge(vec![batch(vec![]), batch(vec![])]).unwrap_err();
        assert!(matches!(
            err,
            IngestError::EmptyResult {
                stage: Stage::Merge,
                ..
            }
        ));
        assert!(merge(vec![]).is_err());
    }

    #[test]
    fn values_pass_through_unvalidated() {
        let mut odd = record("600519.SH", "20250102", -5.0);
        odd.volume = Some(-1.0);
        let merged = merge(vec![batch(vec![odd.clone()])]).unwrap();
        assert_eq!(merged.rows()[0], odd);
    }
}
