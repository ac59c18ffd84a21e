//! Date-keyed daily time-series document.
//!
//! Output shape (labels are part of the consumer-facing schema):
//!
//! ```json
//! {
//!     "Meta Data": {
//!         "1. Information": "Daily Prices (open, high, low, close) and Volumes",
//!         "2. Symbol": "000016.SH",
//!         "3. Last Refreshed": "2025-01-10",
//!         "4. Output Size": "Compact",
//!         "5. Time Zone": "Asia/Shanghai"
//!     },
//!     "Time Series (Daily)": {
//!         "2025-01-10": {
//!             "1. open": "2650.1200",
//!             "2. high": "2661.0000",
//!             "3. low": "2640.5000",
//!             "4. close": "2655.3300",
//!             "5. volume": "123000"
//!         }
//!     }
//! }
//! ```
//!
//! Dates are emitted latest first.

use super::error::{IngestError, Stage};
use super::provider::PriceRecord;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive metadata that does not come from the rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMeta {
    pub description: String,
    pub size_class: String,
    pub timezone: String,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            description: "Daily Prices (open, high, low, close) and Volumes".into(),
            size_class: "Compact".into(),
            timezone: "Asia/Shanghai".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaData {
    #[serde(rename = "1. Information")]
    pub description: String,
    #[serde(rename = "2. Symbol")]
    pub symbol: String,
    #[serde(rename = "3. Last Refreshed")]
    pub last_refreshed: String,
    #[serde(rename = "4. Output Size")]
    pub size_class: String,
    #[serde(rename = "5. Time Zone")]
    pub timezone: String,
}

/// One day's formatted values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEntry {
    #[serde(rename = "1. open")]
    pub open: String,
    #[serde(rename = "2. high")]
    pub high: String,
    #[serde(rename = "3. low")]
    pub low: String,
    #[serde(rename = "4. close")]
    pub close: String,
    #[serde(rename = "5. volume")]
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesDocument {
    #[serde(rename = "Meta Data")]
    pub meta: MetaData,
    /// Keyed by `YYYY-MM-DD`.
    #[serde(rename = "Time Series (Daily)", serialize_with = "latest_first")]
    pub series: BTreeMap<String, DailyEntry>,
}

impl TimeSeriesDocument {
    /// Pretty JSON with 4-space indentation.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

fn latest_first<S: Serializer>(
    series: &BTreeMap<String, DailyEntry>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(series.len()))?;
    for (date, entry) in series.iter().rev() {
        map.serialize_entry(date, entry)?;
    }
    map.end()
}

/// Build the document for `symbol` from its daily rows.
///
/// If two rows share a trade_date the later one in `rows` wins.
pub fn format_series(
    rows: &[PriceRecord],
    symbol: &str,
    meta: &DocumentMeta,
) -> Result<TimeSeriesDocument, IngestError> {
    let latest = rows
        .iter()
        .map(|r| r.trade_date.as_str())
        .max()
        .ok_or_else(|| IngestError::empty(Stage::Format, format!("no daily bars for {symbol}")))?;

    let mut series = BTreeMap::new();
    for row in rows {
        series.insert(
            dashed_date(&row.trade_date),
            DailyEntry {
                open: fixed4(row.open),
                high: fixed4(row.high),
                low: fixed4(row.low),
                close: fixed4(row.close),
                volume: volume_string(row.volume),
            },
        );
    }

    Ok(TimeSeriesDocument {
        meta: MetaData {
            description: meta.description.clone(),
            symbol: symbol.to_string(),
            last_refreshed: dashed_date(latest),
            size_class: meta.size_class.clone(),
            timezone: meta.timezone.clone(),
        },
        series,
    })
}

/// `YYYYMMDD` → `YYYY-MM-DD` by slicing at characters 4 and 6.
///
/// No calendar validation; short input yields short (or empty) parts.
pub fn dashed_date(compact: &str) -> String {
    let chars: Vec<char> = compact.chars().collect();
    let part = |from: usize, to: usize| -> String {
        chars[from.min(chars.len())..to.min(chars.len())]
            .iter()
            .collect()
    };
    format!(
        "{}-{}-{}",
        part(0, 4),
        part(4, 6),
        part(6, chars.len())
    )
}

/// Exactly four decimals, ties to even on the binary value.
///
/// A missing price renders as `nan`; infinities as `inf` / `-inf`.
pub fn fixed4(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    format!("{value:.4}")
}

/// Integer part of the volume; missing or non-finite → `"0"`.
pub fn volume_string(volume: Option<f64>) -> String {
    match volume {
        Some(v) if v.is_finite() => format!("{}", v.trunc() as i64),
        _ => "0".to_string(),
    }
}
