use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{Error, Instrument, Result, Timeframe};

/// Pairs scanned when the config file names none.
pub const DEFAULT_PAIRS: &[&str] = &[
    "EURUSDm", "EURGBPm", "EURCHFm", "EURCADm", "EURNZDm", "EURJPYm", "EURAUDm", "GBPUSDm",
    "GBPJPYm", "GBPCHFm", "GBPAUDm", "GBPNZDm", "GBPCADm", "AUDUSDm", "AUDNZDm", "AUDCADm",
    "AUDJPYm", "AUDCHFm", "NZDUSDm", "NZDJPYm", "NZDCHFm", "NZDCADm", "USDCADm", "USDCHFm",
    "USDJPYm", "CHFJPYm", "CADCHFm", "CADJPYm",
];

/// Top-level scanner config file (TOML).
///
/// Example `config/scanner.toml`:
/// ```toml
/// symbol_suffix = "m"
/// pairs = ["EURUSDm", "GBPJPYm", "AUDCADm"]
///
/// [schedule]
/// interval_secs = 1800
///
/// [[timeframe]]
/// timeframe = "M30"
/// bars = 14
///
/// [[timeframe]]
/// timeframe = "H2"
/// bars = 14
///
/// [thresholds]
/// atr = 0.0006
/// price_change_pct = 0.5
///
/// [weights]
/// atr = 0.5
/// price_change = 0.3
/// smart_money = 0.2
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerFileConfig {
    /// Terminal symbols to scan, e.g. "EURUSDm".
    pub pairs: Vec<String>,
    /// Broker suffix appended to symbols on this account type.
    pub symbol_suffix: String,
    pub schedule: ScheduleConfig,
    #[serde(rename = "timeframe")]
    pub timeframes: Vec<TimeframeConfig>,
    pub thresholds: Thresholds,
    pub weights: ScoreWeights,
    pub indicators: IndicatorConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds to wait after a cycle before starting the next.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeframeConfig {
    pub timeframe: Timeframe,
    /// Bars requested per pair.
    #[serde(default = "default_bars")]
    pub bars: usize,
    /// Contribution to the combined multi-timeframe score.
    #[serde(default = "default_timeframe_weight")]
    pub weight: f64,
}

/// A pair is "quiet" when it is below both thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// ATR in price units.
    pub atr: f64,
    /// Absolute percent change.
    pub price_change_pct: f64,
}

/// Score = atr * normalized ATR + price_change * normalized |change|
///       + smart_money (if flagged).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub atr: f64,
    pub price_change: f64,
    pub smart_money: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub atr_period: usize,
    pub volume_window: usize,
    pub volume_multiplier: f64,
    pub reversal_tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Size of the uncorrelated top list.
    pub top_pairs: usize,
    pub top_currencies: usize,
    pub active_pairs: usize,
    /// High-activity alerts always cover at least this many pairs when available.
    pub min_high_activity: usize,
}

fn default_bars() -> usize {
    14
}

fn default_timeframe_weight() -> f64 {
    1.0
}

impl Default for ScannerFileConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS.iter().map(|s| s.to_string()).collect(),
            symbol_suffix: "m".to_string(),
            schedule: ScheduleConfig::default(),
            timeframes: vec![
                TimeframeConfig {
                    timeframe: Timeframe::M30,
                    bars: default_bars(),
                    weight: default_timeframe_weight(),
                },
                TimeframeConfig {
                    timeframe: Timeframe::H2,
                    bars: default_bars(),
                    weight: default_timeframe_weight(),
                },
            ],
            thresholds: Thresholds::default(),
            weights: ScoreWeights::default(),
            indicators: IndicatorConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 1800 }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            atr: 0.0006,
            price_change_pct: 0.5,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            atr: 0.5,
            price_change: 0.3,
            smart_money: 0.2,
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            volume_window: 14,
            volume_multiplier: 1.5,
            reversal_tolerance: 0.0003,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_pairs: 3,
            top_currencies: 3,
            active_pairs: 5,
            min_high_activity: 3,
        }
    }
}

impl IndicatorConfig {
    /// Fewest bars every indicator needs.
    pub fn min_bars(&self) -> usize {
        self.atr_period.max(self.volume_window).max(2)
    }
}

impl ScannerFileConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read scanner config at '{path}': {e}"))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("Invalid scanner config at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(Error::Config("pair list is empty".into()));
        }
        if self.schedule.interval_secs == 0 {
            return Err(Error::Config("schedule.interval_secs must be > 0".into()));
        }
        if self.timeframes.is_empty() {
            return Err(Error::Config("at least one [[timeframe]] is required".into()));
        }

        let ind = &self.indicators;
        if ind.atr_period == 0 || ind.volume_window == 0 {
            return Err(Error::Config("indicator periods must be >= 1".into()));
        }
        check_non_negative("indicators.volume_multiplier", ind.volume_multiplier)?;
        check_non_negative("indicators.reversal_tolerance", ind.reversal_tolerance)?;

        let mut seen = BTreeSet::new();
        for tf in &self.timeframes {
            if !seen.insert(tf.timeframe) {
                return Err(Error::Config(format!("timeframe {} listed twice", tf.timeframe)));
            }
            if tf.bars < ind.min_bars() {
                return Err(Error::Config(format!(
                    "timeframe {} requests {} bars but indicators need {}",
                    tf.timeframe,
                    tf.bars,
                    ind.min_bars()
                )));
            }
            check_non_negative("timeframe.weight", tf.weight)?;
        }

        check_non_negative("thresholds.atr", self.thresholds.atr)?;
        check_non_negative("thresholds.price_change_pct", self.thresholds.price_change_pct)?;
        check_non_negative("weights.atr", self.weights.atr)?;
        check_non_negative("weights.price_change", self.weights.price_change)?;
        check_non_negative("weights.smart_money", self.weights.smart_money)?;

        if self.report.top_pairs == 0 {
            return Err(Error::Config("report.top_pairs must be >= 1".into()));
        }
        if self.report.min_high_activity == 0 {
            return Err(Error::Config("report.min_high_activity must be >= 1".into()));
        }

        Ok(())
    }

    /// Parse the pair list into instruments. Duplicates are dropped with a warning.
    pub fn instruments(&self) -> Result<Vec<Instrument>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(self.pairs.len());
        for symbol in &self.pairs {
            let instrument = Instrument::parse(symbol.trim(), &self.symbol_suffix)?;
            if !seen.insert(instrument.symbol.clone()) {
                warn!(symbol = %instrument.symbol, "Duplicate pair in config, ignored");
                continue;
            }
            out.push(instrument);
        }
        Ok(out)
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!("{name} must be a finite, non-negative number")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScannerFileConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.instruments().unwrap().len(), DEFAULT_PAIRS.len());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/scanner.toml");
        let cfg = ScannerFileConfig::load(path).unwrap();
        let defaults = ScannerFileConfig::default();
        assert_eq!(cfg.pairs, defaults.pairs);
        assert_eq!(cfg.symbol_suffix, defaults.symbol_suffix);
        assert_eq!(cfg.timeframes.len(), defaults.timeframes.len());
        assert!((cfg.thresholds.atr - defaults.thresholds.atr).abs() < 1e-12);
        assert_eq!(cfg.report.top_pairs, defaults.report.top_pairs);
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let cfg = ScannerFileConfig::from_toml(r#"pairs = ["EURUSDm", "GBPJPYm"]"#).unwrap();
        assert_eq!(cfg.pairs.len(), 2);
        assert_eq!(cfg.schedule.interval_secs, 1800);
        assert_eq!(cfg.timeframes.len(), 2);
        assert_eq!(cfg.timeframes[0].timeframe, Timeframe::M30);
        assert!((cfg.weights.atr - 0.5).abs() < 1e-12);
        assert_eq!(cfg.report.top_pairs, 3);
    }

    #[test]
    fn full_file_parses() {
        let cfg = ScannerFileConfig::from_toml(
            r#"
            symbol_suffix = ""
            pairs = ["EURUSD", "USDJPY"]

            [schedule]
            interval_secs = 600

            [[timeframe]]
            timeframe = "H1"
            bars = 20
            weight = 2.0

            [thresholds]
            atr = 0.001

            [weights]
            atr = 0.6
            price_change = 0.4
            smart_money = 0.0

            [report]
            top_pairs = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timeframes.len(), 1);
        assert_eq!(cfg.timeframes[0].timeframe, Timeframe::H1);
        assert_eq!(cfg.timeframes[0].bars, 20);
        assert!((cfg.thresholds.price_change_pct - 0.5).abs() < 1e-12);
        assert_eq!(cfg.report.top_pairs, 2);
        assert_eq!(cfg.report.active_pairs, 5);
        let instruments = cfg.instruments().unwrap();
        assert_eq!(instruments[1].base, "USD");
    }

    #[test]
    fn too_few_bars_rejected() {
        let err = ScannerFileConfig::from_toml(
            r#"
            pairs = ["EURUSDm"]
            [[timeframe]]
            timeframe = "M30"
            bars = 10
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("indicators need 14"));
    }

    #[test]
    fn duplicate_timeframe_rejected() {
        let err = ScannerFileConfig::from_toml(
            r#"
            pairs = ["EURUSDm"]
            [[timeframe]]
            timeframe = "M30"
            [[timeframe]]
            timeframe = "M30"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn negative_weight_rejected() {
        let err = ScannerFileConfig::from_toml(
            r#"
            pairs = ["EURUSDm"]
            [weights]
            atr = -1.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("weights.atr"));
    }

    #[test]
    fn empty_pairs_rejected() {
        assert!(ScannerFileConfig::from_toml("pairs = []").is_err());
    }

    #[test]
    fn duplicate_pairs_are_dropped() {
        let cfg = ScannerFileConfig {
            pairs: vec!["EURUSDm".into(), "EURUSDm".into(), "USDJPYm".into()],
            ..ScannerFileConfig::default()
        };
        assert_eq!(cfg.instruments().unwrap().len(), 2);
    }

    #[test]
    fn bad_symbol_surfaces_error() {
        let cfg = ScannerFileConfig {
            pairs: vec!["NZDCADmUSDCADm".into()],
            ..ScannerFileConfig::default()
        };
        assert!(cfg.instruments().is_err());
    }
}
