use async_trait::async_trait;

use crate::{Bar, Result, Timeframe};

/// Abstraction over the trading terminal's price history.
///
/// `BridgeClient` implements this against a running terminal.
/// `ReplaySource` implements this from a recorded fixture.
///
/// The scanner only ever reads; nothing here places orders.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short name for logs ("bridge", "replay").
    fn name(&self) -> &str;

    /// Open or verify the terminal session. Called once before the first cycle.
    async fn connect(&self) -> Result<()>;

    /// Fetch the most recent `count` bars for `symbol`, oldest first.
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe, count: usize)
        -> Result<Vec<Bar>>;

    /// Release the session. Called once when monitoring stops.
    async fn shutdown(&self) {}
}
