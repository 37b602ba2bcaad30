use common::Bar;

/// Detects a volume spike on the latest bar together with a reversal candle.
///
/// A bullish reversal sweeps the previous low, closes back near or above
/// the previous high and closes above its own open. Bearish is the mirror
/// image. `reversal_tolerance` is in price units.
#[derive(Debug, Clone)]
pub struct SmartMoneyDetector {
    pub volume_window: usize,
    pub volume_multiplier: f64,
    pub reversal_tolerance: f64,
}

/// Flags produced for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmartMoneySignal {
    pub volume_spike: bool,
    pub bullish_reversal: bool,
    pub bearish_reversal: bool,
}

impl SmartMoneySignal {
    pub fn smart_money(&self) -> bool {
        self.volume_spike && (self.bullish_reversal || self.bearish_reversal)
    }
}

impl Default for SmartMoneyDetector {
    fn default() -> Self {
        Self {
            volume_window: 14,
            volume_multiplier: 1.5,
            reversal_tolerance: 0.0003,
        }
    }
}

impl SmartMoneyDetector {
    pub fn new(volume_window: usize, volume_multiplier: f64, reversal_tolerance: f64) -> Self {
        assert!(volume_window >= 1, "volume window must be >= 1");
        Self {
            volume_window,
            volume_multiplier,
            reversal_tolerance,
        }
    }

    /// Evaluate the last bar of `bars` (oldest first).
    /// Returns `None` with fewer than two bars or fewer than `volume_window` bars.
    pub fn detect(&self, bars: &[Bar]) -> Option<SmartMoneySignal> {
        if bars.len() < 2 || bars.len() < self.volume_window {
            return None;
        }

        let current = &bars[bars.len() - 1];
        let previous = &bars[bars.len() - 2];

        // Average includes the current bar.
        let window = &bars[bars.len() - self.volume_window..];
        let avg_volume =
            window.iter().map(|b| b.tick_volume).sum::<f64>() / self.volume_window as f64;
        let volume_spike = current.tick_volume > avg_volume * self.volume_multiplier;

        let bullish_reversal = current.low <= previous.low
            && current.close >= previous.high - self.reversal_tolerance
            && current.close > current.open;
        let bearish_reversal = current.high >= previous.high
            && current.close <= previous.low + self.reversal_tolerance
            && current.close < current.open;

        Some(SmartMoneySignal {
            volume_spike,
            bullish_reversal,
            bearish_reversal,
        })
    }
}
