use tracing::info;

use common::{CurrencyActivity, Instrument, MetricSet, ScoredPair};

use crate::cycle::{CycleReport, TimeframeReport};

const SMART_MONEY_FLAG: &str = " (Smart Money)";

fn smart_money_flag(flagged: bool) -> &'static str {
    if flagged {
        SMART_MONEY_FLAG
    } else {
        ""
    }
}

pub fn format_scored(pair: &ScoredPair) -> String {
    format!(
        "{}: Score={:.3}, ATR={:.5}, Price Change={:.2}%{}",
        pair.instrument.symbol,
        pair.score,
        pair.atr,
        pair.price_change_pct,
        smart_money_flag(pair.smart_money)
    )
}

pub fn format_currency(activity: &CurrencyActivity) -> String {
    format!("{}: Avg ATR={:.5}", activity.currency, activity.avg_atr)
}

pub fn format_active(instrument: &Instrument, m: &MetricSet) -> String {
    format!(
        "{}: ATR={:.5}, Price Change={:.2}%{}",
        instrument.symbol,
        m.atr,
        m.price_change_pct,
        smart_money_flag(m.smart_money)
    )
}

/// Human-readable lines for one timeframe, in log order.
pub fn timeframe_lines(report: &TimeframeReport) -> Vec<String> {
    let label = report.timeframe.label();
    let analysis = &report.analysis;
    let mut lines = Vec::new();

    if analysis.top_pairs.is_empty() {
        lines.push(format!("No suitable pairs to trade ({label})"));
    } else {
        lines.push(format!("Best pairs to trade ({label}):"));
        lines.extend(analysis.top_pairs.iter().map(format_scored));
    }

    lines.push(format!("Top active currencies ({label}):"));
    lines.extend(analysis.top_currencies.iter().map(format_currency));

    lines.extend(analysis.notifications.iter().map(|n| n.to_string()));

    lines.push(format!("Active pairs ({label}):"));
    lines.extend(analysis.active.iter().map(|(i, m)| format_active(i, m)));

    lines
}

/// Every line for a cycle: each timeframe, then the combined ranking when
/// more than one timeframe is scanned.
pub fn cycle_lines(report: &CycleReport) -> Vec<String> {
    let mut lines: Vec<String> = report.timeframes.iter().flat_map(timeframe_lines).collect();

    if report.timeframes.len() > 1 {
        if report.combined.is_empty() {
            lines.push("No suitable pairs across all timeframes".to_string());
        } else {
            lines.push("Best pairs across all timeframes:".to_string());
            lines.extend(report.combined.iter().map(format_scored));
        }
    }

    lines
}

/// Write the cycle report to the log, one `info!` event per line.
pub fn log_cycle(report: &CycleReport) {
    for line in cycle_lines(report) {
        info!(cycle = %report.id, "{line}");
    }
}
