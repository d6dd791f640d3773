//! Digest computation over a batch of index snapshots.

use std::cmp::Ordering;

use chrono::Utc;

use bellwether_core::config::AlertSettings;
use bellwether_core::IndexCategory;

use crate::types::{
    CategoryTrend, Direction, FailedSymbol, IndexSnapshot, MarketDigest, Mover, Sentiment,
};

/// Thresholds that shape a digest.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestOptions {
    /// Moves at or beyond this absolute percent are listed as significant.
    pub large_move_percent: f64,
    pub neutral_band_percent: f64,
    /// Gainers and losers kept per side.
    pub top_movers: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self::from_alerts(&AlertSettings::default(), 3)
    }
}

impl DigestOptions {
    pub fn from_alerts(alerts: &AlertSettings, top_movers: usize) -> Self {
        Self {
            large_move_percent: alerts.large_move_percent,
            neutral_band_percent: alerts.neutral_band_percent,
            top_movers,
        }
    }
}

/// Summarise fetched snapshots and the symbols that failed.
pub fn summarize(
    snapshots: Vec<IndexSnapshot>,
    failed: Vec<FailedSymbol>,
    opts: &DigestOptions,
) -> MarketDigest {
    let band = opts.neutral_band_percent;

    let mut by_change: Vec<&IndexSnapshot> = snapshots.iter().collect();
    by_change.sort_by(|a, b| cmp_desc(a.change_percent, b.change_percent));

    let gainers = by_change
        .iter()
        .filter(|s| s.change_percent > 0.0)
        .take(opts.top_movers)
        .map(|s| Mover::from(*s))
        .collect();
    let losers = by_change
        .iter()
        .rev()
        .filter(|s| s.change_percent < 0.0)
        .take(opts.top_movers)
        .map(|s| Mover::from(*s))
        .collect();

    let mut significant_moves: Vec<Mover> = snapshots
        .iter()
        .filter(|s| s.change_percent.abs() >= opts.large_move_percent)
        .map(Mover::from)
        .collect();
    significant_moves.sort_by(|a, b| cmp_desc(a.change_percent.abs(), b.change_percent.abs()));

    MarketDigest {
        sentiment: sentiment(&snapshots, band),
        category_trends: category_trends(&snapshots, band),
        gainers,
        losers,
        significant_moves,
        failed,
        sectors: Vec::new(),
        snapshots,
        generated_at: Utc::now(),
    }
}

/// Majority rule over per-index directions.
///
/// Strictly more than half up is bullish, strictly more than half down is
/// bearish. Without a majority, any mix of up and down is mixed and anything
/// else (all flat, or one side plus flats) is neutral.
pub fn sentiment(snapshots: &[IndexSnapshot], neutral_band_percent: f64) -> Sentiment {
    let total = snapshots.len();
    if total == 0 {
        return Sentiment::Neutral;
    }

    let (mut up, mut down) = (0usize, 0usize);
    for s in snapshots {
        match s.direction(neutral_band_percent) {
            Direction::Up => up += 1,
            Direction::Down => down += 1,
            Direction::Flat => {}
        }
    }

    if up * 2 > total {
        Sentiment::Bullish
    } else if down * 2 > total {
        Sentiment::Bearish
    } else if up > 0 && down > 0 {
        Sentiment::Mixed
    } else {
        Sentiment::Neutral
    }
}

/// Average change per market-cap bucket. Sector and uncategorised indices are skipped.
pub fn category_trends(snapshots: &[IndexSnapshot], neutral_band_percent: f64) -> Vec<CategoryTrend> {
    [
        IndexCategory::LargeCap,
        IndexCategory::MidCap,
        IndexCategory::SmallCap,
    ]
    .into_iter()
    .filter_map(|category| {
        let changes: Vec<f64> = snapshots
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.change_percent)
            .collect();
        if changes.is_empty() {
            return None;
        }
        let average = changes.iter().sum::<f64>() / changes.len() as f64;
        Some(CategoryTrend {
            category,
            label: category.to_string(),
            average_change_percent: average,
            direction: Direction::classify(average, neutral_band_percent),
            count: changes.len(),
        })
    })
    .collect()
}

/// Sector indices ordered from best to worst performer.
pub fn rank_sectors(sectors: &[IndexSnapshot]) -> Vec<Mover> {
    let mut ranked: Vec<Mover> = sectors.iter().map(Mover::from).collect();
    ranked.sort_by(|a, b| cmp_desc(a.change_percent, b.change_percent));
    ranked
}

impl MarketDigest {
    pub fn with_sectors(mut self, sectors: &[IndexSnapshot]) -> Self {
        self.sectors = rank_sectors(sectors);
        self
    }
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(symbol: &str, category: IndexCategory, change_percent: f64) -> IndexSnapshot {
        IndexSnapshot::new(
            symbol,
            symbol,
            category,
            100.0 + change_percent,
            100.0,
            Utc::now(),
        )
    }

    fn large(symbol: &str, pct: f64) -> IndexSnapshot {
        snap(symbol, IndexCategory::LargeCap, pct)
    }

    #[test]
    fn empty_batch_is_neutral() {
        assert_eq!(sentiment(&[], 0.5), Sentiment::Neutral);
        let digest = summarize(Vec::new(), Vec::new(), &DigestOptions::default());
        assert!(digest.is_unavailable());
        assert_eq!(digest.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn strict_majority_up_is_bullish() {
        let s = vec![large("A", 1.0), large("B", 0.8), large("C", -1.0)];
        assert_eq!(sentiment(&s, 0.5), Sentiment::Bullish);
    }

    #[test]
    fn strict_majority_down_is_bearish() {
        let s = vec![large("A", -1.0), large("B", -0.8), large("C", 0.1)];
        assert_eq!(sentiment(&s, 0.5), Sentiment::Bearish);
    }

    #[test]
    fn even_split_is_mixed() {
        let s = vec![large("A", 1.0), large("B", -1.0)];
        assert_eq!(sentiment(&s, 0.5), Sentiment::Mixed);
    }

    #[test]
    fn one_up_one_flat_is_neutral() {
        // NIFTY +1.2 %, SENSEX -0.3 % (inside the band)
        let s = vec![large("^NSEI", 1.2), large("^BSESN", -0.3)];
        assert_eq!(sentiment(&s, 0.5), Sentiment::Neutral);
    }

    #[test]
    fn band_is_configurable() {
        let s = vec![large("A", 0.3), large("B", 0.4)];
        assert_eq!(sentiment(&s, 0.5), Sentiment::Neutral);
        assert_eq!(sentiment(&s, 0.2), Sentiment::Bullish);
    }

    #[test]
    fn movers_are_ranked_and_capped() {
        let s = vec![
            large("A", 2.5),
            large("B", 0.4),
            large("C", -0.2),
            large("D", 1.1),
            large("E", -3.0),
        ];
        let opts = DigestOptions {
            top_movers: 2,
            ..DigestOptions::default()
        };
        let d = summarize(s, Vec::new(), &opts);
        let gainers: Vec<&str> = d.gainers.iter().map(|m| m.symbol.as_str()).collect();
        let losers: Vec<&str> = d.losers.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(gainers, vec!["A", "D"]);
        assert_eq!(losers, vec!["E", "C"]);
    }

    #[test]
    fn significant_moves_use_absolute_threshold() {
        let s = vec![large("A", 1.55), large("B", -1.6), large("C", 1.45)];
        let d = summarize(s, Vec::new(), &DigestOptions::default());
        let sig: Vec<&str> = d.significant_moves.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(sig, vec!["B", "A"]);
    }

    #[test]
    fn failures_are_carried_into_digest() {
        let failed = vec![FailedSymbol {
            symbol: "^X".into(),
            name: "X".into(),
            reason: "timed out".into(),
        }];
        let d = summarize(vec![large("A", 0.1)], failed, &DigestOptions::default());
        assert_eq!(d.failed.len(), 1);
        assert!(!d.is_unavailable());
    }

    #[test]
    fn category_trends_average_per_bucket() {
        let s = vec![
            large("A", 1.0),
            large("B", -0.2),
            snap("M", IndexCategory::MidCap, -1.0),
            snap("BANK", IndexCategory::Sector, 5.0),
        ];
        let trends = category_trends(&s, 0.5);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].category, IndexCategory::LargeCap);
        assert!((trends[0].average_change_percent - 0.4).abs() < 1e-9);
        assert_eq!(trends[0].direction, Direction::Flat);
        assert_eq!(trends[1].direction, Direction::Down);
        assert_eq!(trends[1].label, "mid-cap");
    }

    #[test]
    fn sectors_rank_best_first() {
        let sectors = vec![
            snap("PHARMA", IndexCategory::Sector, -0.1),
            snap("IT", IndexCategory::Sector, 0.8),
            snap("AUTO", IndexCategory::Sector, 0.3),
        ];
        let ranked: Vec<String> = rank_sectors(&sectors).into_iter().map(|m| m.symbol).collect();
        assert_eq!(ranked, vec!["IT", "AUTO", "PHARMA"]);
    }
}
