//! Indexbars Core: index constituent prices and index series ingestion.
//!
//! This crate holds the data layer:
//! - Provider trait and the Tushare Pro client
//! - Constituent resolution with snapshot fallback
//! - Row-budgeted request window planning
//! - Windowed batch fetching, merge and canonical ordering
//! - The date-keyed time-series document for the index itself

pub mod data;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: data types can cross thread boundaries.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::PriceRecord>();
        require_sync::<data::PriceRecord>();
        require_send::<data::ConstituentRecord>();
        require_sync::<data::ConstituentRecord>();
        require_send::<data::SymbolSet>();
        require_sync::<data::SymbolSet>();
        require_send::<data::DateRange>();
        require_sync::<data::DateRange>();
        require_send::<data::MergedDataset>();
        require_sync::<data::MergedDataset>();
        require_send::<data::TimeSeriesDocument>();
        require_sync::<data::TimeSeriesDocument>();
        require_send::<data::IngestError>();
        require_sync::<data::IngestError>();

        require_send::<data::TushareProvider>();
        require_sync::<data::TushareProvider>();
    }

    /// Resolver and fetcher only need a shared provider reference.
    #[test]
    fn provider_is_object_safe() {
        fn _check(provider: &dyn data::DataProvider) -> data::BatchFetcher<'_> {
            data::BatchFetcher::new(provider, data::BarKind::Equity)
        }
    }
}
