//! Yahoo Finance chart API client.
//!
//! Uses the daily chart endpoint over a five-day range: the last close is the
//! current value and the close before it is the previous close. This keeps
//! working after market hours and on weekends.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::MarketError;
use crate::source::{Quote, QuoteSource};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) bellwether/0.1";

pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
}

impl YahooSource {
    pub fn new() -> Result<Self, MarketError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?range=5d&interval=1d",
            self.base_url,
            symbol.replace('^', "%5E")
        )
    }
}

#[async_trait::async_trait]
impl QuoteSource for YahooSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketError> {
        let url = self.chart_url(symbol);
        debug!(symbol, "Yahoo chart request to {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        // Unknown symbols come back as 404 with an error object in the body.
        if status != 200 {
            return match parse_chart(symbol, &body) {
                Err(e @ MarketError::DataUnavailable { .. }) => Err(e),
                _ => Err(MarketError::Api {
                    symbol: symbol.to_string(),
                    status,
                }),
            };
        }

        parse_chart(symbol, &body)
    }

    fn source_name(&self) -> &str {
        "yahoo"
    }
}

// ── Response shape ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Extract current and previous close from a chart response body.
pub(crate) fn parse_chart(symbol: &str, body: &str) -> Result<Quote, MarketError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| MarketError::Parse(format!("{symbol}: {e}")))?;

    if let Some(err) = envelope.chart.error {
        let reason = err
            .description
            .or(err.code)
            .unwrap_or_else(|| "unknown chart error".to_string());
        return Err(MarketError::unavailable(symbol, reason));
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| MarketError::unavailable(symbol, "empty chart result"))?;

    // Closes and timestamps are parallel arrays; nulls mark missing sessions.
    let closes: Vec<(Option<i64>, f64)> = result
        .indicators
        .quote
        .first()
        .map(|q| {
            q.close
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.map(|v| (result.timestamp.get(i).copied(), v)))
                .collect()
        })
        .unwrap_or_default();

    let (current, previous_close, ts) = match closes.as_slice() {
        [.., (_, prev), (ts, last)] => (*last, *prev, *ts),
        [(ts, only)] => {
            let prev = result.meta.chart_previous_close.unwrap_or(*only);
            (*only, prev, *ts)
        }
        [] => {
            let price = result
                .meta
                .regular_market_price
                .ok_or_else(|| MarketError::unavailable(symbol, "no closing prices in range"))?;
            let prev = result.meta.chart_previous_close.unwrap_or(price);
            (price, prev, result.meta.regular_market_time)
        }
    };

    Ok(Quote {
        current,
        previous_close,
        timestamp: ts.and_then(to_utc).unwrap_or_else(Utc::now),
        is_demo: false,
    })
}

fn to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
