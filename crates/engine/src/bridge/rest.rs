use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use common::{Bar, Error, MarketDataSource, Result, Timeframe};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for a terminal bridge: a small HTTP service running beside a
/// logged-in trading terminal that exposes its rates history.
///
/// Endpoints used:
/// - `GET /health` → 2xx when the terminal session is up
/// - `GET /rates?symbol=EURUSDm&timeframe=M30&count=14` → JSON array of rate rows
pub struct BridgeClient {
    base_url: Url,
    token: Option<String>,
    http: Client,
}

impl BridgeClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("invalid TERMINAL_URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid bridge path '{path}': {e}")))
    }

    fn rates_url(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Url> {
        let mut url = self.endpoint("rates")?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("timeframe", timeframe.as_str())
            .append_pair("count", &count.to_string());
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<String> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Terminal(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for BridgeClient {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn connect(&self) -> Result<()> {
        let body = self.get(self.endpoint("health")?).await?;
        info!(url = %self.base_url, "Terminal bridge reachable");
        debug!(health = %body.trim(), "Bridge health response");
        Ok(())
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>> {
        let url = self.rates_url(symbol, timeframe, count)?;
        debug!(%symbol, %timeframe, count, "Requesting rates from bridge");
        let body = self.get(url).await?;
        parse_rates(symbol, &body)
    }
}

/// Decode a rates response body into bars, oldest first.
pub fn parse_rates(symbol: &str, body: &str) -> Result<Vec<Bar>> {
    let mut rows: Vec<RateRow> = serde_json::from_str(body)?;
    if rows.is_empty() {
        return Err(Error::Terminal(format!("no rates returned for {symbol}")));
    }
    rows.sort_by_key(|r| r.time);

    rows.into_iter()
        .map(|r| {
            let time = DateTime::from_timestamp(r.time, 0).ok_or_else(|| {
                Error::Terminal(format!("invalid bar timestamp {} for {symbol}", r.time))
            })?;
            Ok(Bar {
                time,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                tick_volume: r.tick_volume,
            })
        })
        .collect()
}

// ─── Response types ───────────────────────────────────────────────────────────

/// One row of the terminal's rates array. Extra columns (spread, real
/// volume) are ignored.
#[derive(Deserialize)]
struct RateRow {
    /// Bar open time, unix seconds.
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_volume: f64,
}
