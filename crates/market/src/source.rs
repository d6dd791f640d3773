use chrono::{DateTime, Utc};

use crate::error::MarketError;

/// Raw price pair for one symbol, before naming and categorisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub current: f64,
    pub previous_close: f64,
    pub timestamp: DateTime<Utc>,
    pub is_demo: bool,
}

/// A backend that can look up the latest and previous close for a symbol.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketError>;

    /// Short name used in logs (e.g., "yahoo", "demo").
    fn source_name(&self) -> &str;
}
