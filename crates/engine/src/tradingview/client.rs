use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use common::{Error, IndicatorSnapshot, Instrument, Result, SnapshotProvider, TimeFrame};

use super::columns::{base_columns, request_columns, summarize};

/// Upper bound on one scanner round trip, connect included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the public TradingView scanner. One POST per
/// (instrument, time frame) snapshot.
pub struct TradingViewClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    /// Absent or `null` when the scanner rejects the request.
    #[serde(default)]
    data: Option<Vec<ScanRow>>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    /// "EXCHANGE:SYMBOL"
    s: String,
    d: Vec<Value>,
}

impl TradingViewClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(concat!("pipfarm/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn scan_url(&self, screener: &str) -> String {
        format!("{}/{}/scan", self.base_url, screener.to_lowercase())
    }

    pub fn request_body(instrument: &Instrument, time_frame: TimeFrame) -> Value {
        json!({
            "symbols": {
                "tickers": [instrument.ticker()],
                "query": { "types": [] }
            },
            "columns": request_columns(time_frame),
        })
    }

    /// Turn a scanner response body into a snapshot. A missing, null or
    /// empty `data` array means the provider has nothing for this symbol
    /// right now.
    pub fn parse_response(
        instrument: &Instrument,
        time_frame: TimeFrame,
        body: &str,
    ) -> Result<IndicatorSnapshot> {
        let response: ScanResponse = serde_json::from_str(body)?;
        let row = response
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| Error::unavailable(&instrument.symbol, "scanner returned no data"))?;

        if row.s != instrument.ticker() {
            debug!(expected = %instrument.ticker(), got = %row.s, "Scanner returned a different ticker");
        }

        let columns = base_columns();
        if row.d.len() != columns.len() {
            return Err(Error::unavailable(
                &instrument.symbol,
                format!("expected {} columns, got {}", columns.len(), row.d.len()),
            ));
        }

        let values: HashMap<&str, f64> = columns
            .into_iter()
            .zip(row.d.iter())
            .filter_map(|(column, value)| value.as_f64().map(|v| (column, v)))
            .collect();

        let (moving_averages, indicators) = summarize(&values);
        Ok(IndicatorSnapshot {
            symbol: instrument.symbol.clone(),
            time_frame,
            moving_averages,
            indicators,
        })
    }
}

#[async_trait]
impl SnapshotProvider for TradingViewClient {
    async fn snapshot(
        &self,
        instrument: &Instrument,
        time_frame: TimeFrame,
    ) -> Result<IndicatorSnapshot> {
        let url = self.scan_url(&instrument.screener);
        debug!(pair = %instrument.symbol, time_frame = %time_frame, "Requesting scanner snapshot");

        let resp = self
            .http
            .post(&url)
            .json(&Self::request_body(instrument, time_frame))
            .send()
            .await
            .map_err(|e| Error::unavailable(&instrument.symbol, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::unavailable(&instrument.symbol, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::unavailable(
                &instrument.symbol,
                format!("HTTP {status}: {body}"),
            ));
        }
        Self::parse_response(instrument, time_frame, &body)
    }
}
