use common::{Bar, Error, MetricSet, Result};

use crate::config::IndicatorConfig;
use crate::indicators::{price_change_pct, AtrIndicator, SmartMoneyDetector};

/// Compute the full metric set for one pair on one timeframe.
///
/// Rejects windows that are too short for the configured indicators and
/// windows containing a malformed bar.
pub fn compute_metrics(symbol: &str, bars: &[Bar], cfg: &IndicatorConfig) -> Result<MetricSet> {
    let needed = cfg.min_bars();
    if bars.len() < needed {
        return Err(Error::InsufficientBars {
            symbol: symbol.to_string(),
            needed,
            got: bars.len(),
        });
    }

    if let Some(index) = bars.iter().position(|b| !b.is_well_formed()) {
        return Err(Error::MalformedBar {
            symbol: symbol.to_string(),
            index,
        });
    }

    let insufficient = || Error::InsufficientBars {
        symbol: symbol.to_string(),
        needed,
        got: bars.len(),
    };

    let atr = AtrIndicator::new(cfg.atr_period)
        .compute(bars)
        .ok_or_else(insufficient)?;
    let price_change_pct = price_change_pct(bars).ok_or_else(insufficient)?;
    let signal = SmartMoneyDetector::new(
        cfg.volume_window,
        cfg.volume_multiplier,
        cfg.reversal_tolerance,
    )
    .detect(bars)
    .ok_or_else(insufficient)?;

    Ok(MetricSet {
        atr,
        price_change_pct,
        volume_spike: signal.volume_spike,
        bullish_reversal: signal.bullish_reversal,
        bearish_reversal: signal.bearish_reversal,
        smart_money: signal.smart_money(),
    })
}
