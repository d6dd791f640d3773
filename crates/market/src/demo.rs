//! Static quote source for offline runs and tests.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::MarketError;
use crate::source::{Quote, QuoteSource};

/// Serves fixed `(current, previous_close)` pairs. Unknown symbols are unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    quotes: HashMap<String, (f64, f64)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Representative Indian index values, marked as demo data.
    pub fn demo() -> Self {
        Self::new()
            .with_quote("^NSEI", 23450.75, 23398.50)
            .with_quote("^BSESN", 78120.30, 77980.25)
            .with_quote("^NSEMDCP50", 15234.80, 15180.50)
            .with_quote("^CNXSMALLCAP", 18956.40, 18890.75)
            .with_quote("^NSEBANK", 51240.60, 50985.65)
            .with_quote("^CNXIT", 41325.90, 40997.95)
            .with_quote("^CNXAUTO", 23510.20, 23439.90)
            .with_quote("^CNXPHARMA", 21870.45, 21892.35)
            .with_quote("^CNXFMCG", 56230.10, 56117.85)
    }

    pub fn with_quote(mut self, symbol: &str, current: f64, previous_close: f64) -> Self {
        self.quotes.insert(symbol.to_string(), (current, previous_close));
        self
    }
}

#[async_trait::async_trait]
impl QuoteSource for StaticSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketError> {
        let (current, previous_close) = self
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketError::unavailable(symbol, "unknown symbol"))?;
        Ok(Quote {
            current,
            previous_close,
            timestamp: Utc::now(),
            is_demo: true,
        })
    }

    fn source_name(&self) -> &str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_covers_default_indices() {
        let src = StaticSource::demo();
        for symbol in ["^NSEI", "^BSESN", "^NSEMDCP50", "^CNXSMALLCAP", "^CNXIT"] {
            let q = src.fetch_quote(symbol).await.unwrap();
            assert!(q.is_demo);
            assert!(q.current > 0.0);
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_unavailable() {
        let err = StaticSource::new().fetch_quote("^NOPE").await.unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));
    }
}
