//! Batch fetcher: one provider call per planned window, with progress reporting.

use super::constituents::SymbolSet;
use super::error::{IngestError, Stage};
use super::provider::{DataError, DataProvider, PriceRecord};
use super::window::RequestWindow;

/// Which provider endpoint a fetcher calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    /// Constituent stocks, all symbols in one call.
    Equity,
    /// The index itself; the symbol set holds only the index code.
    Index,
}

/// Rows returned for one window. May be empty.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub window: RequestWindow,
    pub records: Vec<PriceRecord>,
}

/// Progress callback for windowed fetches.
pub trait FetchProgress {
    /// Called before the provider call for a window.
    fn on_window_start(&self, window: &RequestWindow, index: usize, total: usize);

    /// Called after the provider call for a window returns.
    fn on_window_complete(
        &self,
        window: &RequestWindow,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    /// Called once every window has been fetched.
    fn on_batch_complete(&self, rows: usize, non_empty: usize, total: usize);
}

/// Progress reporter that writes `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_window_start(&self, window: &RequestWindow, index: usize, total: usize) {
        tracing::debug!(window = %window, "[{}/{}] fetching", index + 1, total);
    }

    fn on_window_complete(
        &self,
        window: &RequestWindow,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(0) => tracing::info!(window = %window, "[{}/{}] no rows", index + 1, total),
            Ok(rows) => {
                tracing::info!(window = %window, rows, "[{}/{}] fetched", index + 1, total)
            }
            Err(e) => tracing::error!(window = %window, "[{}/{}] failed: {e}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, rows: usize, non_empty: usize, total: usize) {
        tracing::info!(rows, "fetch complete: {non_empty}/{total} windows returned data");
    }
}

/// Executes windowed provider calls for a fixed symbol set.
pub struct BatchFetcher<'a> {
    provider: &'a dyn DataProvider,
    kind: BarKind,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(provider: &'a dyn DataProvider, kind: BarKind) -> Self {
        Self { provider, kind }
    }

    /// Fetch one window. An empty result is a valid, empty batch.
    pub fn fetch(
        &self,
        symbols: &SymbolSet,
        window: &RequestWindow,
    ) -> Result<RawBatch, IngestError> {
        ensure_symbols(symbols)?;
        let records = self.call(symbols, window).map_err(provider_fault)?;
        Ok(RawBatch {
            window: *window,
            records,
        })
    }

    /// Fetch every window in order, stopping at the first fault.
    ///
    /// Empty batches are dropped from the returned list.
    pub fn fetch_all(
        &self,
        symbols: &SymbolSet,
        windows: &[RequestWindow],
        progress: &dyn FetchProgress,
    ) -> Result<Vec<RawBatch>, IngestError> {
        ensure_symbols(symbols)?;

        let total = windows.len();
        let mut batches = Vec::with_capacity(total);
        let mut rows = 0;

        for (i, window) in windows.iter().enumerate() {
            progress.on_window_start(window, i, total);

            let result = self.call(symbols, window);
            progress.on_window_complete(window, i, total, result.as_ref().map(Vec::len));

            let records = result.map_err(provider_fault)?;
            if !records.is_empty() {
                rows += records.len();
                batches.push(RawBatch {
                    window: *window,
                    records,
                });
            }
        }

        progress.on_batch_complete(rows, batches.len(), total);
        Ok(batches)
    }

    fn call(
        &self,
        symbols: &SymbolSet,
        window: &RequestWindow,
    ) -> Result<Vec<PriceRecord>, DataError> {
        let (start, end) = (window.start(), window.end());
        tracing::debug!(
            kind = ?self.kind,
            symbols = symbols.len(),
            window = %window,
            "requesting daily bars"
        );

        match self.kind {
            BarKind::Equity => self.provider.fetch_daily_bars(symbols.as_slice(), start, end),
            BarKind::Index => self.provider.fetch_index_daily(&symbols.joined(), start, end),
        }
    }
}

fn ensure_symbols(symbols: &SymbolSet) -> Result<(), IngestError> {
    if symbols.is_empty() {
        return Err(IngestError::invalid(
            Stage::Fetch,
            "cannot fetch bars for an empty symbol set",
        ));
    }
    Ok(())
}

fn provider_fault(source: DataError) -> IngestError {
    IngestError::Provider {
        stage: Stage::Fetch,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::ConstituentRecord;
    use crate::data::window::{plan, DateRange};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Returns one bar per symbol on each window's start date, and records calls.
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
        fail_on_call: Option<usize>,
        empty_on_call: Option<usize>,
    }

    impl RecordingProvider {
        fn respond(
            &self,
            symbols: Vec<String>,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceRecord>, DataError> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.len();
            calls.push((symbols.join(","), start, end));
            if self.fail_on_call == Some(n) {
                return Err(DataError::RateLimited("too many requests".into()));
            }
            if self.empty_on_call == Some(n) {
                return Ok(Vec::new());
            }
            Ok(symbols
                .into_iter()
                .map(|symbol| PriceRecord {
                    symbol,
                    trade_date: start.format("%Y%m%d").to_string(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    pre_close: None,
                    change: None,
                    pct_change: None,
                    volume: Some(1.0),
                    amount: None,
                })
                .collect())
        }
    }

    impl DataProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn fetch_constituents(
            &self,
            _index_code: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<ConstituentRecord>, DataError> {
            Ok(Vec::new())
        }

        fn fetch_daily_bars(
            &self,
            symbols: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceRecord>, DataError> {
            self.respond(symbols.to_vec(), start, end)
        }

        fn fetch_index_daily(
            &self,
            index_code: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceRecord>, DataError> {
            self.respond(vec![index_code.to_string()], start, end)
        }
    }

    struct Silent;

    impl FetchProgress for Silent {
        fn on_window_start(&self, _: &RequestWindow, _: usize, _: usize) {}
        fn on_window_complete(
            &self,
            _: &RequestWindow,
            _: usize,
            _: usize,
            _: Result<usize, &DataError>,
        ) {
        }
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn symbols() -> SymbolSet {
        SymbolSet::from_ordered(["600519.SH", "601318.SH", "600036.SH"])
    }

    #[test]
    fn one_call_per_window_with_all_symbols() {
        let provider = RecordingProvider::default();
        let range = DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).unwrap();
        let windows = plan(&range, 3, 12).unwrap();
        assert_eq!(windows.len(), 3);

        let batches = BatchFetcher::new(&provider, BarKind::Equity)
            .fetch_all(&symbols(), &windows, &Silent)
            .unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls
            .iter()
            .all(|(s, _, _)| s == "600519.SH,601318.SH,600036.SH"));
        assert_eq!(calls[0].1, d(2025, 1, 1));
        assert_eq!(calls[2].2, d(2025, 1, 10));
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.records.len() == 3));
    }

    #[test]
    fn empty_windows_are_skipped() {
        let provider = RecordingProvider {
            empty_on_call: Some(1),
            ..Default::default()
        };
        let range = DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).unwrap();
        let windows = plan(&range, 3, 12).unwrap();

        let batches = BatchFetcher::new(&provider, BarKind::Equity)
            .fetch_all(&symbols(), &windows, &Silent)
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].window, windows[2]);
    }

    #[test]
    fn first_fault_stops_the_run() {
        let provider = RecordingProvider {
            fail_on_call: Some(1),
            ..Default::default()
        };
        let range = DateRange::new(d(2025, 1, 1), d(2025, 1, 10)).unwrap();
        let windows = plan(&range, 3, 12).unwrap();

        let err = BatchFetcher::new(&provider, BarKind::Equity)
            .fetch_all(&symbols(), &windows, &Silent)
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Provider {
                stage: Stage::Fetch,
                source: DataError::RateLimited(_)
            }
        ));
        assert_eq!(provider.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn empty_symbol_set_is_invalid_input() {
        let provider = RecordingProvider::default();
        let window = DateRange::new(d(2025, 1, 1), d(2025, 1, 1)).unwrap();
        let err = BatchFetcher::new(&provider, BarKind::Equity)
            .fetch(&SymbolSet::default(), &window)
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::InvalidInput {
                stage: Stage::Fetch,
                ..
            }
        ));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn index_kind_uses_the_index_endpoint() {
        let provider = RecordingProvider::default();
        let window = DateRange::new(d(2025, 1, 2), d(2025, 1, 3)).unwrap();
        let batch = BatchFetcher::new(&provider, BarKind::Index)
            .fetch(&SymbolSet::from_ordered(["000016.SH"]), &window)
            .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].symbol, "000016.SH");
        assert_eq!(batch.window, window);
    }
}
