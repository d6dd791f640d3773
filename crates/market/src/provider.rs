use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use bellwether_core::config::{IndexSettings, MarketSettings, MarketSourceKind};
use bellwether_core::IndexCategory;

use crate::demo::StaticSource;
use crate::error::MarketError;
use crate::source::QuoteSource;
use crate::types::{FailedSymbol, IndexSnapshot};
use crate::yahoo::YahooSource;

/// Outcome of a batch fetch. Both lists keep the order of the request.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub snapshots: Vec<IndexSnapshot>,
    pub failures: Vec<FailedSymbol>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.failures.is_empty()
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.symbol.as_str()).collect()
    }
}

struct CacheEntry {
    fetched: Instant,
    snapshot: IndexSnapshot,
}

/// Fetches index snapshots with a per-call timeout and a short-lived cache.
pub struct MarketProvider {
    source: Arc<dyn QuoteSource>,
    catalog: HashMap<String, IndexSettings>,
    timeout: Duration,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl MarketProvider {
    pub fn new(source: Arc<dyn QuoteSource>, settings: &MarketSettings) -> Self {
        let catalog = settings
            .indices
            .iter()
            .chain(settings.sectors.iter())
            .map(|i| (i.symbol.clone(), i.clone()))
            .collect();
        Self {
            source,
            catalog,
            timeout: Duration::from_secs(settings.fetch_timeout_secs.max(1)),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Build the provider for the configured source; `force_demo` overrides it.
    pub fn from_settings(settings: &MarketSettings, force_demo: bool) -> Result<Self, MarketError> {
        let source: Arc<dyn QuoteSource> = match (force_demo, settings.source) {
            (true, _) | (false, MarketSourceKind::Demo) => Arc::new(StaticSource::demo()),
            (false, MarketSourceKind::Yahoo) => Arc::new(YahooSource::new()?),
        };
        info!(source = source.source_name(), "market provider ready");
        Ok(Self::new(source, settings))
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Fetch one symbol. Names and categories come from settings when known.
    pub async fn fetch_index(&self, symbol: &str) -> Result<IndexSnapshot, MarketError> {
        let entry = self
            .catalog
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| IndexSettings::new(symbol, symbol, IndexCategory::Other));
        self.fetch_entry(&entry).await
    }

    /// Fetch every entry concurrently; one failure never aborts the batch.
    pub async fn fetch_all(&self, entries: &[IndexSettings]) -> BatchResult {
        let results = join_all(entries.iter().map(|e| self.fetch_entry(e))).await;

        let mut batch = BatchResult::default();
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(snapshot) => batch.snapshots.push(snapshot),
                Err(e) => batch.failures.push(FailedSymbol {
                    symbol: entry.symbol.clone(),
                    name: entry.name.clone(),
                    reason: e.reason(),
                }),
            }
        }
        batch
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        info!("market data cache cleared");
    }

    async fn fetch_entry(&self, entry: &IndexSettings) -> Result<IndexSnapshot, MarketError> {
        let symbol = entry.symbol.as_str();
        if let Some(hit) = self.cached(symbol) {
            debug!(symbol, "returning cached snapshot");
            return Ok(hit);
        }

        let quote = match tokio::time::timeout(self.timeout, self.source.fetch_quote(symbol)).await {
            Ok(Ok(q)) => q,
            Ok(Err(e)) => {
                warn!(symbol, error = %e, "market fetch failed");
                return Err(match e {
                    MarketError::DataUnavailable { .. } => e,
                    other => MarketError::unavailable(symbol, other.to_string()),
                });
            }
            Err(_) => {
                warn!(symbol, timeout_secs = self.timeout.as_secs(), "market fetch timed out");
                return Err(MarketError::unavailable(
                    symbol,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let mut snapshot = IndexSnapshot::new(
            symbol,
            entry.name.clone(),
            entry.category,
            quote.current,
            quote.previous_close,
            quote.timestamp,
        );
        snapshot.is_demo = quote.is_demo;
        info!(
            symbol,
            price = snapshot.current_price,
            change_pct = snapshot.change_percent,
            "fetched {}",
            snapshot.name
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                symbol.to_string(),
                CacheEntry {
                    fetched: Instant::now(),
                    snapshot: snapshot.clone(),
                },
            );
        }
        Ok(snapshot)
    }

    fn cached(&self, symbol: &str) -> Option<IndexSnapshot> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.lock().ok()?;
        cache
            .get(symbol)
            .filter(|e| e.fetched.elapsed() < self.cache_ttl)
            .map(|e| e.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Quote;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: StaticSource,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl QuoteSource for CountingSource {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_quote(symbol).await
        }

        fn source_name(&self) -> &str {
            "counting"
        }
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl QuoteSource for SlowSource {
        async fn fetch_quote(&self, _symbol: &str) -> Result<Quote, MarketError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(MarketError::Parse("unreachable".into()))
        }

        fn source_name(&self) -> &str {
            "slow"
        }
    }

    fn settings() -> MarketSettings {
        MarketSettings {
            fetch_timeout_secs: 1,
            ..MarketSettings::default()
        }
    }

    #[tokio::test]
    async fn batch_isolates_failing_symbol() {
        let source = StaticSource::new()
            .with_quote("^NSEI", 101.2, 100.0)
            .with_quote("^BSESN", 99.7, 100.0);
        let provider = MarketProvider::new(Arc::new(source), &settings());
        let entries = vec![
            IndexSettings::new("^NSEI", "NIFTY 50", IndexCategory::LargeCap),
            IndexSettings::new("^BROKEN", "Broken", IndexCategory::Other),
            IndexSettings::new("^BSESN", "BSE SENSEX", IndexCategory::LargeCap),
        ];

        let batch = provider.fetch_all(&entries).await;
        assert_eq!(batch.snapshots.len(), 2);
        assert_eq!(batch.snapshots[0].symbol, "^NSEI");
        assert_eq!(batch.snapshots[1].symbol, "^BSESN");
        assert_eq!(batch.failed_symbols(), vec!["^BROKEN"]);
    }

    #[tokio::test]
    async fn cache_serves_repeat_fetches() {
        let source = Arc::new(CountingSource {
            inner: StaticSource::demo(),
            calls: AtomicUsize::new(0),
        });
        let provider = MarketProvider::new(source.clone(), &settings());

        let a = provider.fetch_index("^NSEI").await.unwrap();
        let b = provider.fetch_index("^NSEI").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "NIFTY 50");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        provider.clear_cache();
        provider.fetch_index("^NSEI").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let source = Arc::new(CountingSource {
            inner: StaticSource::demo(),
            calls: AtomicUsize::new(0),
        });
        let s = MarketSettings {
            cache_ttl_secs: 0,
            ..settings()
        };
        let provider = MarketProvider::new(source.clone(), &s);
        provider.fetch_index("^NSEI").await.unwrap();
        provider.fetch_index("^NSEI").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_unavailable() {
        let provider = MarketProvider::new(Arc::new(SlowSource), &settings());
        let err = provider.fetch_index("^NSEI").await.unwrap_err();
        match err {
            MarketError::DataUnavailable { symbol, reason } => {
                assert_eq!(symbol, "^NSEI");
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_symbol_uses_symbol_as_name() {
        let source = StaticSource::new().with_quote("^GSPC", 5000.0, 4950.0);
        let provider = MarketProvider::new(Arc::new(source), &settings());
        let s = provider.fetch_index("^GSPC").await.unwrap();
        assert_eq!(s.name, "^GSPC");
        assert_eq!(s.category, IndexCategory::Other);
    }
}
