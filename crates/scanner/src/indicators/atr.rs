use common::Bar;

/// ATR (Average True Range) indicator.
///
/// Simple moving average of the true range over the last `period` bars.
/// The very first bar of the input has no previous close, so its true range
/// is just `high - low`.
/// Returns `None` until at least `period` bars are available.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }

    /// Compute ATR from a slice of bars (oldest first).
    pub fn compute(&self, bars: &[Bar]) -> Option<f64> {
        if bars.len() < self.period {
            return None;
        }

        let ranges = true_ranges(bars);
        let window = &ranges[ranges.len() - self.period..];
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}

/// True range of every bar in `bars`.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    let mut ranges = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;

    for bar in bars {
        let high_low = bar.high - bar.low;
        let range = match prev_close {
            Some(pc) => high_low.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            None => high_low,
        };
        ranges.push(range);
        prev_close = Some(bar.close);
    }

    ranges
}
