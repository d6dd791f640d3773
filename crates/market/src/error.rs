use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    /// No usable data for the symbol. Timeouts and transport failures collapse
    /// into this variant at the provider boundary.
    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} for {symbol}")]
    Api { symbol: String, status: u16 },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl MarketError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Human-readable reason without the symbol prefix.
    pub fn reason(&self) -> String {
        match self {
            MarketError::DataUnavailable { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
