//! Market data boundary: the scan pipeline only ever sees "give me a
//! time-ordered daily series for this symbol". The bundled client speaks the
//! Alpha Vantage daily endpoint; anything else can slot in behind the trait.

use crate::error::SymbolError;
use crate::types::{OhlcvBar, OhlcvSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches up to `lookback_bars` of daily history, oldest first. A newly
    /// listed symbol may legitimately return fewer bars; the classifier
    /// decides whether that is enough.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        lookback_bars: usize,
    ) -> Result<OhlcvSeries, SymbolError>;
}

#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataSource for AlphaVantageClient {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        lookback_bars: usize,
    ) -> Result<OhlcvSeries, SymbolError> {
        let outputsize = if lookback_bars <= 100 { "compact" } else { "full" };
        debug!("[AlphaVantage] Fetching {} ({} bars)", symbol, lookback_bars);

        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", outputsize),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SymbolError::DataUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| {
                warn!("[AlphaVantage] HTTP error for {}: {}", symbol, e);
                SymbolError::DataUnavailable(e.to_string())
            })?;

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| SymbolError::DataUnavailable(e.to_string()))?;

        // The API reports throttling and bad symbols as 200s with a note.
        for key in ["Error Message", "Note", "Information"] {
            if let Some(msg) = body.get(key).and_then(|v| v.as_str()) {
                warn!("[AlphaVantage] {} for {}: {}", key, symbol, msg);
                return Err(SymbolError::DataUnavailable(msg.to_string()));
            }
        }

        let series = body
            .get("Time Series (Daily)")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                SymbolError::DataUnavailable("response missing daily series".into())
            })?;

        let mut bars = Vec::with_capacity(series.len());
        for (date, fields) in series {
            let date: NaiveDate = date
                .parse()
                .map_err(|e| SymbolError::DataUnavailable(format!("bad date {date}: {e}")))?;
            bars.push(OhlcvBar {
                date,
                open: field(fields, "1. open")?,
                high: field(fields, "2. high")?,
                low: field(fields, "3. low")?,
                close: field(fields, "4. close")?,
                volume: field(fields, "5. volume")?,
            });
        }

        // Keys arrive newest-first; the pipeline wants ascending dates.
        bars.sort_by_key(|b| b.date);
        if bars.len() > lookback_bars {
            bars.drain(..bars.len() - lookback_bars);
        }

        OhlcvSeries::new(bars).map_err(SymbolError::DataUnavailable)
    }
}

fn field(fields: &JsonValue, key: &str) -> Result<f64, SymbolError> {
    fields
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SymbolError::DataUnavailable(format!("missing field {key}")))
}
