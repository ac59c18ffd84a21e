//! Output file names derived from the index code.

/// Index codes with a fixed, human-readable stem.
const KNOWN_STEMS: &[(&str, &str)] = &[("000016.SH", "sse_50")];

/// File-name stem for `index_code`: a known alias, or the code with `.` → `_`.
pub fn output_stem(index_code: &str) -> String {
    KNOWN_STEMS
        .iter()
        .find(|(code, _)| *code == index_code)
        .map(|(_, stem)| stem.to_string())
        .unwrap_or_else(|| index_code.replace('.', "_"))
}

/// Tabular constituent prices: `daily_prices_{stem}.csv`.
pub fn prices_file_name(stem: &str) -> String {
    format!("daily_prices_{stem}.csv")
}

/// Index time-series document: `index_daily_{stem}.json`.
pub fn index_file_name(stem: &str) -> String {
    format!("index_daily_{stem}.json")
}
