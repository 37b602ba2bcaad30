use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A tradable currency pair as the terminal names it, e.g. `EURUSDm`.
///
/// `base` and `quote` are the two ISO currency codes with any broker suffix
/// removed. Ordering is by symbol so instruments can key ordered maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub base: String,
    pub quote: String,
}

impl Instrument {
    /// Parse a terminal symbol. `suffix` is the broker's account-type marker
    /// (e.g. `"m"`), stripped before splitting when present.
    pub fn parse(symbol: &str, suffix: &str) -> Result<Self> {
        let core = if !suffix.is_empty() && symbol.len() > 6 {
            symbol.strip_suffix(suffix).unwrap_or(symbol)
        } else {
            symbol
        };

        if core.len() != 6 || !core.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidSymbol(symbol.to_string()));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            base: core[..3].to_ascii_uppercase(),
            quote: core[3..].to_ascii_uppercase(),
        })
    }

    pub fn currencies(&self) -> [&str; 2] {
        [&self.base, &self.quote]
    }

    /// True when either leg of `self` appears in `other`.
    pub fn shares_currency_with(&self, other: &Instrument) -> bool {
        self.currencies()
            .iter()
            .any(|c| other.currencies().contains(c))
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Bar period understood by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H2 => "H2",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// Label used in report lines.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1min",
            Timeframe::M5 => "5min",
            Timeframe::M15 => "15min",
            Timeframe::M30 => "30min",
            Timeframe::H1 => "1hour",
            Timeframe::H2 => "2hour",
            Timeframe::H4 => "4hour",
            Timeframe::D1 => "1day",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            Timeframe::M1 => chrono::Duration::minutes(1),
            Timeframe::M5 => chrono::Duration::minutes(5),
            Timeframe::M15 => chrono::Duration::minutes(15),
            Timeframe::M30 => chrono::Duration::minutes(30),
            Timeframe::H1 => chrono::Duration::hours(1),
            Timeframe::H2 => chrono::Duration::hours(2),
            Timeframe::H4 => chrono::Duration::hours(4),
            Timeframe::D1 => chrono::Duration::days(1),
        }
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H2" => Ok(Timeframe::H2),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV sample as returned by the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Number of price changes during the bar. Forex terminals report no
    /// traded volume, so this is the only activity measure available.
    pub tick_volume: f64,
}

impl Bar {
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.tick_volume.is_finite()
            && self.tick_volume >= 0.0
    }
}

/// Direction of a reversal candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reversal {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Reversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reversal::Bullish => write!(f, "Bullish"),
            Reversal::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Derived per-instrument values for one timeframe. Recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub atr: f64,
    /// Signed percent change from the first to the last close of the window.
    pub price_change_pct: f64,
    pub volume_spike: bool,
    pub bullish_reversal: bool,
    pub bearish_reversal: bool,
    /// Volume spike coinciding with a reversal candle.
    pub smart_money: bool,
}

impl MetricSet {
    pub fn reversal(&self) -> Option<Reversal> {
        if self.bullish_reversal {
            Some(Reversal::Bullish)
        } else if self.bearish_reversal {
            Some(Reversal::Bearish)
        } else {
            None
        }
    }
}

/// An instrument with its weighted score for one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub instrument: Instrument,
    pub score: f64,
    pub atr: f64,
    pub price_change_pct: f64,
    pub smart_money: bool,
}

/// Average ATR of all evaluated pairs a currency takes part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyActivity {
    pub currency: String,
    pub avg_atr: f64,
    pub pair_count: usize,
}

/// Alert lines emitted after each timeframe is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    HighActivity {
        symbol: String,
        atr: f64,
        price_change_pct: f64,
    },
    SmartMoney {
        symbol: String,
        reversal: Reversal,
    },
    FewHighActivity {
        count: usize,
    },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::HighActivity {
                symbol,
                atr,
                price_change_pct,
            } => write!(
                f,
                "High activity detected in {symbol}: ATR={atr:.5}, Price Change={price_change_pct:.2}%"
            ),
            Notification::SmartMoney { symbol, reversal } => write!(
                f,
                "Smart money activity detected in {symbol}: {reversal} reversal with volume spike"
            ),
            Notification::FewHighActivity { count } => {
                write!(f, "Note: Only {count} high activity pair(s) detected")
            }
        }
    }
}
