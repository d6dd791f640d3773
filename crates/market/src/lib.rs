//! Market snapshot provider for the configured stock indices.
//!
//! This crate provides:
//! - `QuoteSource` trait with a Yahoo Finance chart client and a static demo source
//! - `MarketProvider` adding per-call timeouts, a short-lived cache and concurrent batch fetches
//! - Digest analysis: sentiment, top movers, significant moves, category trends and sectors

pub mod analysis;
pub mod demo;
pub mod error;
pub mod provider;
pub mod source;
pub mod types;
pub mod yahoo;

pub use analysis::{summarize, DigestOptions};
pub use demo::StaticSource;
pub use error::MarketError;
pub use provider::{BatchResult, MarketProvider};
pub use source::{Quote, QuoteSource};
pub use types::*;
pub use yahoo::YahooSource;
