use std::collections::BTreeMap;

use common::{Instrument, MetricSet, Notification};

use crate::config::Thresholds;

/// Build the alert list for one timeframe.
///
/// High-activity pairs (above either threshold) are reported by ATR,
/// at least `min_high_activity` of them when that many exist, plus any
/// further pairs tied with the last one taken. Every smart-money pair is
/// reported. A trailing note is added when fewer than `min_high_activity`
/// pairs qualified.
pub fn check_notifications(
    metrics: &BTreeMap<Instrument, MetricSet>,
    thresholds: &Thresholds,
    min_high_activity: usize,
) -> Vec<Notification> {
    let mut high: Vec<(&Instrument, &MetricSet)> = metrics
        .iter()
        .filter(|(_, m)| {
            m.atr > thresholds.atr || m.price_change_pct.abs() > thresholds.price_change_pct
        })
        .collect();
    high.sort_by(|a, b| b.1.atr.total_cmp(&a.1.atr));

    let mut selected = Vec::new();
    if let Some(cutoff_idx) = min_high_activity.min(high.len()).checked_sub(1) {
        let cutoff_atr = high[cutoff_idx].1.atr;
        for (instrument, m) in &high {
            if selected.len() < min_high_activity || m.atr >= cutoff_atr {
                selected.push((*instrument, *m));
            } else {
                break;
            }
        }
    }

    let mut notifications: Vec<Notification> = selected
        .iter()
        .map(|(instrument, m)| Notification::HighActivity {
            symbol: instrument.symbol.clone(),
            atr: m.atr,
            price_change_pct: m.price_change_pct,
        })
        .collect();

    notifications.extend(metrics.iter().filter(|(_, m)| m.smart_money).filter_map(
        |(instrument, m)| {
            m.reversal().map(|reversal| Notification::SmartMoney {
                symbol: instrument.symbol.clone(),
                reversal,
            })
        },
    ));

    if selected.len() < min_high_activity {
        notifications.push(Notification::FewHighActivity {
            count: selected.len(),
        });
    }

    notifications
}
