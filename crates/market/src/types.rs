use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bellwether_core::IndexCategory;

/// Point-in-time values for one index. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub symbol: String,
    pub name: String,
    pub category: IndexCategory,
    pub current_price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
    /// True when the values came from the built-in demo source.
    #[serde(default)]
    pub is_demo: bool,
}

impl IndexSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        category: IndexCategory,
        current_price: f64,
        previous_close: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let change = current_price - previous_close;
        let change_percent = if previous_close == 0.0 {
            0.0
        } else {
            change / previous_close * 100.0
        };
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category,
            current_price,
            previous_close,
            change,
            change_percent,
            timestamp,
            is_demo: false,
        }
    }

    pub fn direction(&self, neutral_band_percent: f64) -> Direction {
        Direction::classify(self.change_percent, neutral_band_percent)
    }
}

/// Movement of a single value relative to a neutral band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Up above `+band`, down below `-band`, flat otherwise.
    pub fn classify(change_percent: f64, band: f64) -> Self {
        if change_percent > band {
            Direction::Up
        } else if change_percent < -band {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Flat => "flat",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall market mood across the monitored indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Mixed,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Mixed => "mixed",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol that could not be fetched, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSymbol {
    pub symbol: String,
    pub name: String,
    pub reason: String,
}

/// Entry in a gainers/losers/significant-moves list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub name: String,
    pub change_percent: f64,
}

impl From<&IndexSnapshot> for Mover {
    fn from(s: &IndexSnapshot) -> Self {
        Self {
            symbol: s.symbol.clone(),
            name: s.name.clone(),
            change_percent: s.change_percent,
        }
    }
}

/// Average movement of one market-cap bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub category: IndexCategory,
    pub label: String,
    pub average_change_percent: f64,
    pub direction: Direction,
    pub count: usize,
}

/// Condensed view of a batch of snapshots, ready for templating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDigest {
    pub sentiment: Sentiment,
    pub snapshots: Vec<IndexSnapshot>,
    pub gainers: Vec<Mover>,
    pub losers: Vec<Mover>,
    pub significant_moves: Vec<Mover>,
    pub failed: Vec<FailedSymbol>,
    pub category_trends: Vec<CategoryTrend>,
    /// Sector indices ranked best to worst.
    pub sectors: Vec<Mover>,
    pub generated_at: DateTime<Utc>,
}

impl MarketDigest {
    /// True when no index could be fetched at all.
    pub fn is_unavailable(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_demo(&self) -> bool {
        !self.snapshots.is_empty() && self.snapshots.iter().all(|s| s.is_demo)
    }
}
