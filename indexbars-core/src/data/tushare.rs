//! Tushare Pro data provider.
//!
//! Every endpoint is a `POST` of `{"api_name", "token", "params", "fields"}`
//! to one URL. Responses carry a status `code` and a column-oriented table:
//! `{"data": {"fields": [...], "items": [[...], ...]}}`.
//!
//! One HTTP request per call, no retries. Row caps are the caller's concern.

use super::provider::{ConstituentRecord, DataError, DataProvider, PriceRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://api.tushare.pro";

const DATE_PARAM_FORMAT: &str = "%Y%m%d";
const BAR_FIELDS: &str =
    "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";
const WEIGHT_FIELDS: &str = "index_code,con_code,trade_date,weight";

/// Status codes the API uses for bad or missing tokens.
const AUTH_CODES: &[i64] = &[-2001, 40101];
/// Status code for "too many calls per minute".
const RATE_LIMIT_CODE: i64 = 40203;

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: BTreeMap<&'a str, String>,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ApiTable>,
}

#[derive(Debug, Deserialize)]
struct ApiTable {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

/// Connection settings for [`TushareProvider`].
#[derive(Debug, Clone)]
pub struct TushareOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TushareOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Tushare Pro provider.
pub struct TushareProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl TushareProvider {
    pub fn new(token: impl Into<String>, options: TushareOptions) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: options.base_url,
            token: token.into(),
        })
    }

    /// Execute one API call and return its table (empty when the API sends none).
    fn call(
        &self,
        api_name: &str,
        params: BTreeMap<&str, String>,
        fields: &str,
    ) -> Result<ApiTable, DataError> {
        let request = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields,
        };

        let resp = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(format!("{api_name}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited(format!("HTTP {status} for {api_name}")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationRequired(format!(
                "HTTP {status} for {api_name}"
            )));
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {api_name}")));
        }

        let body: ApiResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse {api_name} response: {e}"))
        })?;

        unwrap_response(api_name, body)
    }
}

fn date_params(start: NaiveDate, end: NaiveDate) -> [(&'static str, String); 2] {
    [
        ("start_date", start.format(DATE_PARAM_FORMAT).to_string()),
        ("end_date", end.format(DATE_PARAM_FORMAT).to_string()),
    ]
}

/// Check the status code and take the table out of a response.
fn unwrap_response(api_name: &str, body: ApiResponse) -> Result<ApiTable, DataError> {
    if body.code != 0 {
        let message = body.msg.unwrap_or_default();
        return Err(if AUTH_CODES.contains(&body.code) {
            DataError::AuthenticationRequired(message)
        } else if body.code == RATE_LIMIT_CODE {
            DataError::RateLimited(message)
        } else {
            DataError::Api {
                code: body.code,
                message: format!("{api_name}: {message}"),
            }
        });
    }

    Ok(body.data.unwrap_or(ApiTable {
        fields: Vec::new(),
        items: Vec::new(),
    }))
}

/// Column positions of a response table, looked up by name.
struct Columns<'t> {
    table: &'t ApiTable,
}

impl<'t> Columns<'t> {
    fn index(&self, name: &str) -> Option<usize> {
        self.table.fields.iter().position(|f| f == name)
    }

    fn require(&self, name: &str) -> Result<usize, DataError> {
        self.index(name).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("response is missing column '{name}'"))
        })
    }
}

fn cell<'v>(item: &'v [Value], idx: Option<usize>) -> Option<&'v Value> {
    idx.and_then(|i| item.get(i))
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bars(table: &ApiTable) -> Result<Vec<PriceRecord>, DataError> {
    if table.items.is_empty() {
        return Ok(Vec::new());
    }

    let cols = Columns { table };
    let symbol = cols.require("ts_code")?;
    let trade_date = cols.require("trade_date")?;
    let open = cols.index("open");
    let high = cols.index("high");
    let low = cols.index("low");
    let close = cols.index("close");
    let pre_close = cols.index("pre_close");
    let change = cols.index("change");
    let pct_chg = cols.index("pct_chg");
    let vol = cols.index("vol");
    let amount = cols.index("amount");

    table
        .items
        .iter()
        .map(|item| {
            let key = |idx: usize, name: &str| {
                text(item.get(idx)).ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("row has no '{name}' value"))
                })
            };

            Ok(PriceRecord {
                symbol: key(symbol, "ts_code")?,
                trade_date: key(trade_date, "trade_date")?,
                open: number(cell(item, open)).unwrap_or(f64::NAN),
                high: number(cell(item, high)).unwrap_or(f64::NAN),
                low: number(cell(item, low)).unwrap_or(f64::NAN),
                close: number(cell(item, close)).unwrap_or(f64::NAN),
                pre_close: number(cell(item, pre_close)),
                change: number(cell(item, change)),
                pct_change: number(cell(item, pct_chg)),
                volume: number(cell(item, vol)),
                amount: number(cell(item, amount)),
            })
        })
        .collect()
}

fn parse_weights(table: &ApiTable) -> Result<Vec<ConstituentRecord>, DataError> {
    if table.items.is_empty() {
        return Ok(Vec::new());
    }

    let cols = Columns { table };
    let con_code = cols.require("con_code")?;
    let index_code = cols.index("index_code");
    let trade_date = cols.index("trade_date");
    let weight = cols.index("weight");

    table
        .items
        .iter()
        .map(|item| {
            let code = text(item.get(con_code)).ok_or_else(|| {
                DataError::ResponseFormatChanged("row has no 'con_code' value".into())
            })?;
            Ok(ConstituentRecord {
                index_code: text(cell(item, index_code)).unwrap_or_default(),
                con_code: code,
                trade_date: text(cell(item, trade_date)).unwrap_or_default(),
                weight: number(cell(item, weight)),
            })
        })
        .collect()
}

impl DataProvider for TushareProvider {
    fn name(&self) -> &str {
        "tushare"
    }

    fn fetch_constituents(
        &self,
        index_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ConstituentRecord>, DataError> {
        let mut params: BTreeMap<&str, String> = date_params(start, end).into_iter().collect();
        params.insert("index_code", index_code.to_string());
        let table = self.call("index_weight", params, WEIGHT_FIELDS)?;
        parse_weights(&table)
    }

    fn fetch_daily_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, DataError> {
        let mut params: BTreeMap<&str, String> = date_params(start, end).into_iter().collect();
        params.insert("ts_code", symbols.join(","));
        let table = self.call("daily", params, BAR_FIELDS)?;
        parse_bars(&table)
    }

    fn fetch_index_daily(
        &self,
        index_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, DataError> {
        let mut params: BTreeMap<&str, String> = date_params(start, end).into_iter().collect();
        params.insert("ts_code", index_code.to_string());
        let table = self.call("index_daily", params, BAR_FIELDS)?;
        parse_bars(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_daily_table() {
        let body = response(
            r#"{"code":0,"msg":"","data":{
                "fields":["ts_code","trade_date","open","high","low","close","pre_close","change","pct_chg","vol","amount"],
                "items":[
                    ["600519.SH","20250103",1500.0,1520.5,1490.0,1510.0,1498.0,12.0,0.8011,23456.78,3541234.5],
                    ["601318.SH","20250103",52.1,53.0,51.9,52.8,52.0,0.8,1.5385,null,null]
                ]}}"#,
        );
        let table = unwrap_response("daily", body).unwrap();
        let bars = parse_bars(&table).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "600519.SH");
        assert_eq!(bars[0].trade_date, "20250103");
        assert_eq!(bars[0].high, 1520.5);
        assert_eq!(bars[0].volume, Some(23456.78));
        assert_eq!(bars[1].volume, None);
        assert_eq!(bars[1].pct_change, Some(1.5385));
    }

    #[test]
    fn null_prices_become_nan() {
        let body = response(
            r#"{"code":0,"data":{"fields":["ts_code","trade_date","open","close"],
                "items":[["000016.SH","20250102",null,2600.0]]}}"#,
        );
        let bars = parse_bars(&unwrap_response("index_daily", body).unwrap()).unwrap();
        assert!(bars[0].open.is_nan());
        assert!(bars[0].high.is_nan());
        assert_eq!(bars[0].close, 2600.0);
    }

    #[test]
    fn missing_data_block_is_empty_not_error() {
        let body = response(r#"{"code":0,"msg":"","data":null}"#);
        let table = unwrap_response("daily", body).unwrap();
        assert!(parse_bars(&table).unwrap().is_empty());
    }

    #[test]
    fn empty_items_is_empty_not_error() {
        let body = response(r#"{"code":0,"data":{"fields":["con_code"],"items":[]}}"#);
        let table = unwrap_response("index_weight", body).unwrap();
        assert!(parse_weights(&table).unwrap().is_empty());
    }

    #[test]
    fn missing_key_column_is_format_change() {
        let body = response(
            r#"{"code":0,"data":{"fields":["trade_date","close"],"items":[["20250102",1.0]]}}"#,
        );
        let err = parse_bars(&unwrap_response("daily", body).unwrap()).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn error_codes_are_classified() {
        let auth = unwrap_response("daily", response(r#"{"code":-2001,"msg":"token invalid"}"#));
        assert!(matches!(auth, Err(DataError::AuthenticationRequired(_))));

        let rate = unwrap_response("daily", response(r#"{"code":40203,"msg":"too many"}"#));
        assert!(matches!(rate, Err(DataError::RateLimited(_))));

        let other = unwrap_response("daily", response(r#"{"code":50101,"msg":"boom"}"#));
        match other {
            Err(DataError::Api { code, message }) => {
                assert_eq!(code, 50101);
                assert!(message.contains("daily"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parses_weight_table_in_order() {
        let body = response(
            r#"{"code":0,"data":{"fields":["index_code","con_code","trade_date","weight"],
                "items":[
                    ["000016.SH","600519.SH","20250102",14.2],
                    ["000016.SH","601318.SH","20250102",7.9]
                ]}}"#,
        );
        let rows = parse_weights(&unwrap_response("index_weight", body).unwrap()).unwrap();
        let codes: Vec<&str> = rows.iter().map(|r| r.con_code.as_str()).collect();
        assert_eq!(codes, vec!["600519.SH", "601318.SH"]);
        assert_eq!(rows[0].weight, Some(14.2));
    }

    #[test]
    fn request_body_shape() {
        let mut params: BTreeMap<&str, String> = date_params(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        )
        .into_iter()
        .collect();
        params.insert("ts_code", "600519.SH,601318.SH".into());
        let req = ApiRequest {
            api_name: "daily",
            token: "t",
            params,
            fields: BAR_FIELDS,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["api_name"], "daily");
        assert_eq!(json["params"]["start_date"], "20250101");
        assert_eq!(json["params"]["end_date"], "20250110");
        assert_eq!(json["params"]["ts_code"], "600519.SH,601318.SH");
    }
}
