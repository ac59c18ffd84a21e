//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over the remote market-data service so the
//! resolver and fetcher can be driven by the Tushare client in production and
//! by an in-memory double in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily bar as returned by the provider (unadjusted, unvalidated).
///
/// Serialized field names follow the provider's column names, which is also
/// the header of the persisted CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "ts_code")]
    pub symbol: String,
    /// Trading day as the provider sends it: `YYYYMMDD`.
    pub trade_date: String,
    /// OHLC prices are NaN when the provider sent null; NaN is an empty CSV field.
    #[serde(with = "missing_price")]
    pub open: f64,
    #[serde(with = "missing_price")]
    pub high: f64,
    #[serde(with = "missing_price")]
    pub low: f64,
    #[serde(with = "missing_price")]
    pub close: f64,
    pub pre_close: Option<f64>,
    pub change: Option<f64>,
    #[serde(rename = "pct_chg")]
    pub pct_change: Option<f64>,
    #[serde(rename = "vol")]
    pub volume: Option<f64>,
    pub amount: Option<f64>,
}

/// Maps NaN to and from an absent value.
mod missing_price {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// One row of an index weight listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentRecord {
    pub index_code: String,
    pub con_code: String,
    pub trade_date: String,
    pub weight: Option<f64>,
}

/// Structured error types for provider calls.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("provider returned code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for remote market-data providers.
///
/// Every method may return an empty vector without failing (holidays, an index
/// with no published weights yet). A fault is always a [`DataError`].
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Constituent weights of `index_code` published within `[start, end]`.
    fn fetch_constituents(
        &self,
        index_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, DataError>;

    /// Daily bars for all `symbols` within `[start, end]`, in a single call.
    fn fetch_daily_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, DataError>;

    /// Daily bars of the index itself within `[start, end]`.
    fn fetch_index_daily(
        &self,
        index_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_price_reads_back_as_nan() {
        let row: PriceRecord = serde_json::from_str(
            r#"{"ts_code":"600519.SH","trade_date":"20250102","open":null,"high":1.0,
                "low":1.0,"close":1.0,"pre_close":null,"change":null,"pct_chg":null,
                "vol":null,"amount":null}"#,
        )
        .unwrap();
        assert!(row.open.is_nan());
        assert_eq!(row.close, 1.0);

        let json = serde_json::to_value(&row).unwrap();
        assert!(json["open"].is_null());
        assert_eq!(json["close"], 1.0);
    }
}
