use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use common::{CurrencyActivity, Instrument, MetricSet, ScoredPair};

use crate::config::{ScoreWeights, Thresholds};

/// Score every non-quiet pair and return them best-first.
///
/// ATR and |percent change| are min-max normalized across all evaluated
/// pairs, quiet ones included, so a quiet pair still anchors the scale.
/// A degenerate range (all values equal) normalizes everything to 0.
pub fn score_pairs(
    metrics: &BTreeMap<Instrument, MetricSet>,
    thresholds: &Thresholds,
    weights: &ScoreWeights,
) -> Vec<ScoredPair> {
    if metrics.is_empty() {
        return Vec::new();
    }

    let (atr_min, atr_range) = min_and_range(metrics.values().map(|m| m.atr));
    let (pc_min, pc_range) = min_and_range(metrics.values().map(|m| m.price_change_pct.abs()));

    let mut scored: Vec<ScoredPair> = metrics
        .iter()
        .filter(|(_, m)| {
            !(m.atr < thresholds.atr && m.price_change_pct.abs() < thresholds.price_change_pct)
        })
        .map(|(instrument, m)| {
            let n_atr = (m.atr - atr_min) / atr_range;
            let n_pc = (m.price_change_pct.abs() - pc_min) / pc_range;
            let mut score = weights.atr * n_atr + weights.price_change * n_pc;
            if m.smart_money {
                score += weights.smart_money;
            }
            ScoredPair {
                instrument: instrument.clone(),
                score,
                atr: m.atr,
                price_change_pct: m.price_change_pct,
                smart_money: m.smart_money,
            }
        })
        .collect();

    sort_best_first(&mut scored);
    scored
}

/// Descending score, then descending ATR, then symbol.
pub fn sort_best_first(pairs: &mut [ScoredPair]) {
    pairs.sort_by(compare_best_first);
}

fn compare_best_first(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.atr.total_cmp(&a.atr))
        .then_with(|| a.instrument.symbol.cmp(&b.instrument.symbol))
}

fn min_and_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = if max > min { max - min } else { 1.0 };
    (min, range)
}

/// Walk `ranked` best-first and keep a pair only if neither of its
/// currencies was taken by an earlier pick. Stops at `k` picks.
///
/// Greedy with no backtracking: a strong pair can block two weaker pairs
/// that would together have been a better set.
pub fn select_uncorrelated(ranked: &[ScoredPair], k: usize) -> Vec<ScoredPair> {
    let mut selected = Vec::with_capacity(k);
    let mut used: BTreeSet<&str> = BTreeSet::new();

    for pair in ranked {
        if selected.len() >= k {
            break;
        }
        let inst = &pair.instrument;
        if used.contains(inst.base.as_str()) || used.contains(inst.quote.as_str()) {
            continue;
        }
        used.insert(&inst.base);
        used.insert(&inst.quote);
        selected.push(pair.clone());
    }

    selected
}

/// Average ATR per currency across every pair it appears in, most active first.
pub fn rank_currencies(metrics: &BTreeMap<Instrument, MetricSet>) -> Vec<CurrencyActivity> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

    for (instrument, m) in metrics {
        for currency in instrument.currencies() {
            let entry = totals.entry(currency).or_insert((0.0, 0));
            entry.0 += m.atr;
            entry.1 += 1;
        }
    }

    let mut ranked: Vec<CurrencyActivity> = totals
        .into_iter()
        .map(|(currency, (total, count))| CurrencyActivity {
            currency: currency.to_string(),
            avg_atr: total / count as f64,
            pair_count: count,
        })
        .collect();

    // Stable sort keeps alphabetical order among equal averages.
    ranked.sort_by(|a, b| b.avg_atr.total_cmp(&a.avg_atr));
    ranked
}

/// The `n` pairs with the largest ATR, regardless of thresholds.
pub fn top_active(
    metrics: &BTreeMap<Instrument, MetricSet>,
    n: usize,
) -> Vec<(Instrument, MetricSet)> {
    let mut all: Vec<(&Instrument, &MetricSet)> = metrics.iter().collect();
    all.sort_by(|a, b| b.1.atr.total_cmp(&a.1.atr));
    all.into_iter()
        .take(n)
        .map(|(i, m)| (i.clone(), m.clone()))
        .collect()
}

/// Merge per-timeframe rankings into one.
///
/// Each entry is `(weight, ranking)`. The combined score of a pair is the
/// weighted mean of its per-timeframe scores, counting 0 for timeframes
/// where it was quiet. ATR and price change are taken from the
/// highest-weight timeframe the pair scored on; the smart-money flag is set
/// if any timeframe raised it.
pub fn combine_timeframes(per_timeframe: &[(f64, &[ScoredPair])]) -> Vec<ScoredPair> {
    let total_weight: f64 = per_timeframe.iter().map(|(w, _)| *w).sum();
    if total_weight <= 0.0 {
        return Vec::new();
    }

    // Visit heavier timeframes first so they supply the reported ATR.
    let mut order: Vec<usize> = (0..per_timeframe.len()).collect();
    order.sort_by(|&a, &b| per_timeframe[b].0.total_cmp(&per_timeframe[a].0));

    let mut combined: BTreeMap<&str, ScoredPair> = BTreeMap::new();
    for idx in order {
        let (weight, ranking) = per_timeframe[idx];
        for pair in ranking {
            let contribution = weight * pair.score / total_weight;
            combined
                .entry(pair.instrument.symbol.as_str())
                .and_modify(|acc| {
                    acc.score += contribution;
                    acc.smart_money |= pair.smart_money;
                })
                .or_insert_with(|| ScoredPair {
                    score: contribution,
                    ..pair.clone()
                });
        }
    }

    let mut out: Vec<ScoredPair> = combined.into_values().collect();
    sort_best_first(&mut out);
    out
}
