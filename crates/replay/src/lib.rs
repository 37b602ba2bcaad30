use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::{Bar, Error, MarketDataSource, Result, Timeframe};

/// Recorded bars: symbol → timeframe → bars (oldest first).
///
/// On disk this is plain JSON:
/// ```json
/// { "EURUSDm": { "M30": [ { "time": "2024-01-02T10:00:00Z", "open": 1.0951, ... } ] } }
/// ```
pub type ReplayFixture = BTreeMap<String, BTreeMap<Timeframe, Vec<Bar>>>;

/// Offline market data source backed by a recorded fixture.
///
/// Serves the tail of each recorded series, so a fixture holding more bars
/// than requested behaves like a terminal with deeper history.
/// Never talks to a terminal.
pub struct ReplaySource {
    fixture: ReplayFixture,
}

impl ReplaySource {
    pub fn from_fixture(fixture: ReplayFixture) -> Self {
        Self { fixture }
    }

    /// Load a fixture written by [`save_fixture`] (or by hand).
    pub fn from_path(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read replay fixture at '{path}': {e}")))?;
        let fixture: ReplayFixture = serde_json::from_str(&content)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.fixture.keys().map(String::as_str)
    }
}

#[async_trait]
impl MarketDataSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn connect(&self) -> Result<()> {
        let series: usize = self.fixture.values().map(BTreeMap::len).sum();
        info!(symbols = self.fixture.len(), series, "Replay fixture loaded");
        Ok(())
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>> {
        let bars = self
            .fixture
            .get(symbol)
            .ok_or_else(|| Error::Terminal(format!("symbol {symbol} not in replay fixture")))?
            .get(&timeframe)
            .ok_or_else(|| {
                Error::Terminal(format!("no {timeframe} bars for {symbol} in replay fixture"))
            })?;

        if bars.is_empty() {
            return Err(Error::Terminal(format!("no rates recorded for {symbol}")));
        }

        let start = bars.len().saturating_sub(count);
        debug!(%symbol, %timeframe, served = bars.len() - start, "Replaying bars");
        Ok(bars[start..].to_vec())
    }
}

/// Record the current bars of `symbols` from a live source into a fixture.
/// Pairs that fail are logged and left out.
pub async fn capture_fixture(
    source: &dyn MarketDataSource,
    symbols: &[String],
    timeframes: &[(Timeframe, usize)],
) -> ReplayFixture {
    let mut fixture = ReplayFixture::new();
    for symbol in symbols {
        for &(timeframe, count) in timeframes {
            match source.fetch_bars(symbol, timeframe, count).await {
                Ok(bars) => {
                    fixture
                        .entry(symbol.clone())
                        .or_default()
                        .insert(timeframe, bars);
                }
                Err(e) => {
                    warn!(%symbol, %timeframe, error = %e, "Skipping pair while recording");
                }
            }
        }
    }
    fixture
}

pub fn save_fixture(fixture: &ReplayFixture, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(fixture)?;
    std::fs::write(path, json)?;
    info!(path, symbols = fixture.len(), "Replay fixture written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn series(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 1800, 0).unwrap(),
                open: 1.0 + i as f64 * 0.001,
                high: 1.0 + i as f64 * 0.001 + 0.0005,
                low: 1.0 + i as f64 * 0.001 - 0.0005,
                close: 1.0 + i as f64 * 0.001,
                tick_volume: 100.0 + i as f64,
            })
            .collect()
    }

    fn source() -> ReplaySource {
        let mut fixture = ReplayFixture::new();
        fixture
            .entry("EURUSDm".to_string())
            .or_default()
            .insert(Timeframe::M30, series(20));
        ReplaySource::from_fixture(fixture)
    }

    #[tokio::test]
    async fn serves_most_recent_bars() {
        let bars = source().fetch_bars("EURUSDm", Timeframe::M30, 14).await.unwrap();
        assert_eq!(bars.len(), 14);
        assert!((bars[13].tick_volume - 119.0).abs() < 1e-12);
        assert!((bars[0].tick_volume - 106.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn short_history_returns_what_exists() {
        let bars = source().fetch_bars("EURUSDm", Timeframe::M30, 50).await.unwrap();
        assert_eq!(bars.len(), 20);
    }

    #[tokio::test]
    async fn unknown_symbol_or_timeframe_is_terminal_error() {
        let src = source();
        assert!(matches!(
            src.fetch_bars("GBPJPYm", Timeframe::M30, 14).await,
            Err(Error::Terminal(_))
        ));
        assert!(matches!(
            src.fetch_bars("EURUSDm", Timeframe::H2, 14).await,
            Err(Error::Terminal(_))
        ));
    }

    #[tokio::test]
    async fn capture_and_reload_round_trip() {
        let live = source();
        let symbols = vec!["EURUSDm".to_string(), "GBPJPYm".to_string()];
        let fixture = capture_fixture(&live, &symbols, &[(Timeframe::M30, 14)]).await;
        // GBPJPYm is unknown to the live source and is left out.
        assert_eq!(fixture.len(), 1);

        let path = std::env::temp_dir().join(format!("replay-{}.json", std::process::id()));
        let path = path.to_str().unwrap().to_string();
        save_fixture(&fixture, &path).unwrap();

        let reloaded = ReplaySource::from_path(&path).unwrap();
        assert_eq!(reloaded.symbols().collect::<Vec<_>>(), vec!["EURUSDm"]);
        let bars = reloaded.fetch_bars("EURUSDm", Timeframe::M30, 14).await.unwrap();
        assert_eq!(bars, live.fetch_bars("EURUSDm", Timeframe::M30, 14).await.unwrap());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            ReplaySource::from_path("/nonexistent/fixture.json"),
            Err(Error::Config(_))
        ));
    }
}
