//! Date ranges and request-window planning.
//!
//! The provider caps how many rows one call may return. A call for `n`
//! symbols over `d` calendar days returns at most `n * d` rows, so a long
//! range is cut into windows of `max(1, row_budget / n)` days. Planning is a
//! pure function of its inputs.

use super::error::{IngestError, Stage};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider row cap per call.
pub const DEFAULT_ROW_BUDGET: usize = 6000;

/// Date format used on the wire and in config: `YYYYMMDD`.
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Inclusive calendar date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// Unchecked wire form of [`DateRange`].
#[derive(Deserialize)]
struct RawRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawRange> for DateRange {
    type Error = IngestError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, IngestError> {
        if start > end {
            return Err(IngestError::invalid(
                Stage::Planning,
                format!("range start {start} is after end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse a range from two `YYYYMMDD` strings.
    pub fn parse_compact(start: &str, end: &str) -> Result<Self, IngestError> {
        Self::new(parse_compact_date(start)?, parse_compact_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(COMPACT_DATE_FORMAT),
            self.end.format(COMPACT_DATE_FORMAT)
        )
    }
}

/// One provider call's slice of a [`DateRange`].
pub type RequestWindow = DateRange;

/// Parse a `YYYYMMDD` date.
pub fn parse_compact_date(s: &str) -> Result<NaiveDate, IngestError> {
    NaiveDate::parse_from_str(s, COMPACT_DATE_FORMAT).map_err(|e| {
        IngestError::invalid(Stage::Config, format!("'{s}' is not a YYYYMMDD date: {e}"))
    })
}

/// Days per window for `symbol_count` symbols under `row_budget`.
pub fn window_days(symbol_count: usize, row_budget: usize) -> Result<usize, IngestError> {
    if symbol_count == 0 {
        return Err(IngestError::invalid(
            Stage::Planning,
            "cannot plan request windows for zero symbols",
        ));
    }
    Ok((row_budget / symbol_count).max(1))
}

/// Split `range` into consecutive windows that each fit the row budget.
///
/// The first window starts at `range.start()`, every window is
/// `window_days` long except the last, which is clipped to `range.end()`.
pub fn plan(
    range: &DateRange,
    symbol_count: usize,
    row_budget: usize,
) -> Result<Vec<RequestWindow>, IngestError> {
    let days = window_days(symbol_count, row_budget)?;
    // Never step further than the range itself; keeps the date arithmetic in bounds.
    let step = i64::try_from(days)
        .unwrap_or(i64::MAX)
        .min(range.num_days());

    let mut windows = Vec::with_capacity((range.num_days() / step + 1) as usize);
    let mut current = range.start;
    loop {
        let window_end = match current.checked_add_signed(Duration::days(step - 1)) {
            Some(d) if d < range.end => d,
            _ => range.end,
        };
        windows.push(DateRange {
            start: current,
            end: window_end,
        });
        if window_end >= range.end {
            break;
        }
        current = window_end + Duration::days(1);
    }

    Ok(windows)
}

/// First through last calendar day of the month before `today`.
pub fn previous_month(today: NaiveDate) -> DateRange {
    let first_of_this_month = today.with_day(1).unwrap_or(today);
    let end = first_of_this_month.pred_opt().unwrap_or(first_of_this_month);
    let start = end.with_day(1).unwrap_or(end);
    DateRange { start, end }
}
