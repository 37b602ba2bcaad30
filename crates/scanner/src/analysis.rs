use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use common::{CurrencyActivity, Instrument, MetricSet, Notification, ScoredPair};

use crate::config::ScannerFileConfig;
use crate::notify::check_notifications;
use crate::ranking::{rank_currencies, score_pairs, select_uncorrelated, top_active};

/// Everything derived from one timeframe's metrics.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeAnalysis {
    /// Pairs that produced metrics this cycle.
    pub evaluated: usize,
    /// Every non-quiet pair, best first.
    pub scored: Vec<ScoredPair>,
    /// Best pairs with no currency in common.
    pub top_pairs: Vec<ScoredPair>,
    pub top_currencies: Vec<CurrencyActivity>,
    pub notifications: Vec<Notification>,
    /// Largest-ATR pairs regardless of score.
    pub active: Vec<(Instrument, MetricSet)>,
}

pub fn analyze_timeframe(
    metrics: &BTreeMap<Instrument, MetricSet>,
    cfg: &ScannerFileConfig,
) -> TimeframeAnalysis {
    let scored = score_pairs(metrics, &cfg.thresholds, &cfg.weights);
    let top_pairs = select_uncorrelated(&scored, cfg.report.top_pairs);

    let mut top_currencies = rank_currencies(metrics);
    top_currencies.truncate(cfg.report.top_currencies);

    debug!(
        evaluated = metrics.len(),
        scored = scored.len(),
        selected = top_pairs.len(),
        "Timeframe analysed"
    );

    TimeframeAnalysis {
        evaluated: metrics.len(),
        top_pairs,
        scored,
        top_currencies,
        notifications: check_notifications(
            metrics,
            &cfg.thresholds,
            cfg.report.min_high_activity,
        ),
        active: top_active(metrics, cfg.report.active_pairs),
    }
}
