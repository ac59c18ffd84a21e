//! Index data ingestion: constituents, windowed fetches, merge, formatting.

pub mod batch;
pub mod constituents;
pub mod error;
pub mod merge;
pub mod naming;
pub mod provider;
pub mod timeseries;
pub mod tushare;
pub mod window;

pub use batch::{BarKind, BatchFetcher, FetchProgress, LogProgress, RawBatch};
pub use constituents::{
    load_snapshot, ConstituentResolver, ConstituentSource, ResolvedConstituents, SymbolSet,
};
pub use error::{IngestError, Stage};
pub use merge::{merge, MergedDataset};
pub use naming::{index_file_name, output_stem, prices_file_name};
pub use provider::{ConstituentRecord, DataError, DataProvider, PriceRecord};
pub use timeseries::{format_series, DocumentMeta, TimeSeriesDocument};
pub use tushare::{TushareOptions, TushareProvider};
pub use window::{
    parse_compact_date, plan, previous_month, window_days, DateRange, RequestWindow,
    DEFAULT_ROW_BUDGET,
};
