use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketDataSource, TerminalMode};
use engine::{BridgeClient, CycleReport, CycleRunner, Monitor};
use replay::ReplaySource;
use scanner::ScannerFileConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan forex pairs for volatility and smart-money activity", long_about = None)]
struct Cli {
    /// Scanner config file (overrides SCANNER_CONFIG_PATH)
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Read bars from a recorded fixture instead of the terminal bridge
    #[arg(long, value_name = "FIXTURE")]
    replay: Option<String>,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Print every cycle report to stdout as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Record current bars for every pair and timeframe to a fixture, then exit
    #[arg(long, value_name = "FIXTURE", conflicts_with = "replay")]
    record: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging ──────────────────────────────────────────────────────────────
    // stderr keeps stdout clean for --json.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────────
    let mut overrides = Vec::new();
    if let Some(path) = &cli.replay {
        overrides.push(("TERMINAL_MODE", "replay".to_string()));
        overrides.push(("REPLAY_PATH", path.clone()));
    }
    if let Some(path) = &cli.config {
        overrides.push(("SCANNER_CONFIG_PATH", path.clone()));
    }
    let cfg = Config::from_env_with(&overrides)?;
    info!(mode = %cfg.terminal, "fxscan starting");

    let scanner_cfg =
        load_scanner_config(&cfg.scanner_config_path, cfg.scanner_config_explicit)?;

    // ── Market data source (chosen by TERMINAL_MODE) ─────────────────────────
    let source: Arc<dyn MarketDataSource> = match &cfg.terminal {
        TerminalMode::Bridge { url, token } => {
            info!(%url, "Using terminal bridge");
            Arc::new(BridgeClient::new(url, token.clone())?)
        }
        TerminalMode::Replay { path } => {
            info!(%path, "Using replay fixture");
            Arc::new(ReplaySource::from_path(path)?)
        }
    };

    if let Some(path) = &cli.record {
        return record(source, &scanner_cfg, path).await;
    }

    // ── Monitor ──────────────────────────────────────────────────────────────
    let runner = CycleRunner::new(source, scanner_cfg)?;
    let (monitor, handle) = Monitor::new(runner);

    let stop = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            stop.stop();
        }
    });

    if cli.once {
        if let Some(report) = monitor.run_once().await? {
            if cli.json {
                print_json(&report)?;
            }
        }
        return Ok(());
    }

    if cli.json {
        let mut reports = handle.subscribe_reports();
        tokio::spawn(async move {
            loop {
                match reports.recv().await {
                    Ok(report) => {
                        if let Err(e) = print_json(&report) {
                            warn!(error = %e, "Failed to print cycle report");
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(dropped = n, "JSON printer lagged, reports dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    monitor.run().await?;
    Ok(())
}

/// A missing file at the default location falls back to built-in defaults;
/// a path the user asked for must exist.
fn load_scanner_config(path: &str, explicit: bool) -> anyhow::Result<ScannerFileConfig> {
    if !explicit && !Path::new(path).exists() {
        warn!(%path, "Scanner config not found, using built-in defaults");
        return Ok(ScannerFileConfig::default());
    }
    let cfg = ScannerFileConfig::load(path)?;
    info!(
        %path,
        pairs = cfg.pairs.len(),
        timeframes = cfg.timeframes.len(),
        "Scanner config loaded"
    );
    Ok(cfg)
}

async fn record(
    source: Arc<dyn MarketDataSource>,
    scanner_cfg: &ScannerFileConfig,
    path: &str,
) -> anyhow::Result<()> {
    scanner_cfg.validate()?;
    let symbols: Vec<String> = scanner_cfg
        .instruments()?
        .into_iter()
        .map(|i| i.symbol)
        .collect();
    let timeframes: Vec<_> = scanner_cfg
        .timeframes
        .iter()
        .map(|tf| (tf.timeframe, tf.bars))
        .collect();

    source.connect().await?;
    let fixture = replay::capture_fixture(source.as_ref(), &symbols, &timeframes).await;
    source.shutdown().await;

    replay::save_fixture(&fixture, path)
        .with_context(|| format!("failed to write fixture to '{path}'"))?;
    Ok(())
}

fn print_json(report: &CycleReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
