use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::{error, info};

use common::Result;

use crate::cycle::{CycleReport, CycleRunner};
use crate::report;

/// What the monitor is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Scanning,
    Waiting,
    Stopped,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorState::Idle => write!(f, "idle"),
            MonitorState::Scanning => write!(f, "scanning"),
            MonitorState::Waiting => write!(f, "waiting"),
            MonitorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Cloneable handle used to stop the monitor and observe its output.
#[derive(Clone)]
pub struct MonitorHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    state: Arc<RwLock<MonitorState>>,
    report_tx: broadcast::Sender<Arc<CycleReport>>,
}

impl MonitorHandle {
    /// Ask the monitor to stop. Takes effect immediately, even mid-cycle.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn state(&self) -> MonitorState {
        *self.state.read().await
    }

    /// Subscribe to finished cycle reports.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<Arc<CycleReport>> {
        self.report_tx.subscribe()
    }
}

/// Runs a cycle, logs it, sleeps for the configured interval, repeats.
/// One cycle at a time; nothing is carried between cycles.
pub struct Monitor {
    runner: CycleRunner,
    interval: Duration,
    state: Arc<RwLock<MonitorState>>,
    report_tx: broadcast::Sender<Arc<CycleReport>>,
    shutdown_rx: watch::Receiver<bool>,
    #[allow(dead_code)] // kept so `changed()` never sees a closed channel
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Monitor {
    pub fn new(runner: CycleRunner) -> (Self, MonitorHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let (report_tx, _) = broadcast::channel(16);
        let state = Arc::new(RwLock::new(MonitorState::Idle));
        let interval = Duration::from_secs(runner.config().schedule.interval_secs);

        let handle = MonitorHandle {
            shutdown_tx: shutdown_tx.clone(),
            state: state.clone(),
            report_tx: report_tx.clone(),
        };

        let monitor = Monitor {
            runner,
            interval,
            state,
            report_tx,
            shutdown_rx,
            shutdown_tx,
        };

        (monitor, handle)
    }

    async fn set_state(&self, state: MonitorState) {
        *self.state.write().await = state;
    }

    fn publish(&self, report: CycleReport) -> Arc<CycleReport> {
        report::log_cycle(&report);
        let report = Arc::new(report);
        // No subscribers is fine.
        let _ = self.report_tx.send(report.clone());
        report
    }

    /// Connect, run a single cycle, disconnect.
    /// Returns `None` when stopped before the cycle finished.
    pub async fn run_once(mut self) -> Result<Option<Arc<CycleReport>>> {
        let source = self.runner.source().clone();
        if let Err(e) = source.connect().await {
            error!(source = source.name(), error = %e, "Terminal connection failed");
            self.set_state(MonitorState::Stopped).await;
            return Err(e);
        }

        let report = if *self.shutdown_rx.borrow() {
            None
        } else {
            self.set_state(MonitorState::Scanning).await;
            tokio::select! {
                report = self.runner.run() => Some(report),
                _ = self.shutdown_rx.changed() => None,
            }
        };
        let report = match report {
            Some(report) => Some(self.publish(report)),
            None => {
                info!("Stopped before the cycle finished");
                None
            }
        };

        source.shutdown().await;
        self.set_state(MonitorState::Stopped).await;
        Ok(report)
    }

    /// Run until stopped via the handle. Call from `tokio::spawn` or await directly.
    /// Fails only if the terminal cannot be reached at startup.
    pub async fn run(mut self) -> Result<()> {
        let source = self.runner.source().clone();
        if let Err(e) = source.connect().await {
            error!(source = source.name(), error = %e, "Terminal connection failed");
            self.set_state(MonitorState::Stopped).await;
            return Err(e);
        }
        info!(
            source = source.name(),
            pairs = self.runner.instruments().len(),
            interval_secs = self.interval.as_secs(),
            "Monitor started"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.set_state(MonitorState::Scanning).await;
            let report = tokio::select! {
                report = self.runner.run() => report,
                _ = self.shutdown_rx.changed() => break,
            };
            self.publish(report);

            self.set_state(MonitorState::Waiting).await;
            info!("Waiting {} seconds before next check...", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown_rx.changed() => break,
            }
        }

        info!("Monitoring stopped");
        source.shutdown().await;
        self.set_state(MonitorState::Stopped).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use common::{Bar, Error, MarketDataSource, Timeframe};
    use scanner::ScannerFileConfig;

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        refuse_connect: bool,
        /// Time each `fetch_bars` call takes.
        delay: Duration,
        fetches: AtomicUsize,
        shut_down: AtomicBool,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn connect(&self) -> Result<()> {
            if self.refuse_connect {
                return Err(Error::Terminal("terminal not running".into()));
            }
            Ok(())
        }

        async fn fetch_bars(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            count: usize,
        ) -> Result<Vec<Bar>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok((0..count)
                .map(|_| Bar {
                    time: Utc::now(),
                    open: 1.1,
                    high: 1.102,
                    low: 1.098,
                    close: 1.1,
                    tick_volume: 50.0,
                })
                .collect())
        }

        async fn shutdown(&self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    fn runner(source: Arc<CountingSource>) -> CycleRunner {
        let cfg = ScannerFileConfig {
            pairs: vec!["EURUSDm".into(), "GBPJPYm".into()],
            ..ScannerFileConfig::default()
        };
        CycleRunner::new(source, cfg).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn repeats_on_interval_until_stopped() {
        let source = Arc::new(CountingSource::default());
        let (monitor, handle) = Monitor::new(runner(source.clone()));
        let mut reports = handle.subscribe_reports();

        let task = tokio::spawn(monitor.run());

        let first = reports.recv().await.unwrap();
        // Paused clock auto-advances through the 30 minute wait.
        let second = reports.recv().await.unwrap();
        assert_ne!(first.id, second.id);
        // 2 pairs x 2 timeframes per cycle.
        assert!(source.fetches.load(Ordering::SeqCst) >= 8);

        handle.stop();
        task.await.unwrap().unwrap();
        assert!(source.shut_down.load(Ordering::SeqCst));
        assert_eq!(handle.state().await, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn connection_failure_is_fatal() {
        let source = Arc::new(CountingSource {
            refuse_connect: true,
            ..CountingSource::default()
        });
        let (monitor, handle) = Monitor::new(runner(source.clone()));

        let err = monitor.run().await.unwrap_err();
        assert!(matches!(err, Error::Terminal(_)));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state().await, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn run_once_returns_report_and_shuts_down() {
        let source = Arc::new(CountingSource::default());
        let (monitor, handle) = Monitor::new(runner(source.clone()));

        let report = monitor.run_once().await.unwrap().unwrap();
        assert_eq!(report.timeframes.len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
        assert!(source.shut_down.load(Ordering::SeqCst));
        assert_eq!(handle.state().await, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_start_exits_without_scanning() {
        let source = Arc::new(CountingSource::default());
        let (monitor, handle) = Monitor::new(runner(source.clone()));

        handle.stop();
        monitor.run().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    fn slow_source() -> Arc<CountingSource> {
        Arc::new(CountingSource {
            delay: Duration::from_secs(60),
            ..CountingSource::default()
        })
    }

    /// Yield until the monitor is inside its first fetch.
    async fn wait_for_fetch(source: &CountingSource, handle: &MonitorHandle) {
        while handle.state().await != MonitorState::Scanning
            || source.fetches.load(Ordering::SeqCst) == 0
        {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_cycle_in_progress() {
        let source = slow_source();
        let (monitor, handle) = Monitor::new(runner(source.clone()));
        let mut reports = handle.subscribe_reports();

        let task = tokio::spawn(monitor.run());
        wait_for_fetch(&source, &handle).await;

        let stopped_at = tokio::time::Instant::now();
        handle.stop();
        task.await.unwrap().unwrap();

        assert_eq!(tokio::time::Instant::now(), stopped_at);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(source.shut_down.load(Ordering::SeqCst));
        assert!(reports.try_recv().is_err());
        assert_eq!(handle.state().await, MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_single_cycle() {
        let source = slow_source();
        let (monitor, handle) = Monitor::new(runner(source.clone()));
        let mut reports = handle.subscribe_reports();

        let task = tokio::spawn(monitor.run_once());
        wait_for_fetch(&source, &handle).await;

        let stopped_at = tokio::time::Instant::now();
        handle.stop();
        let report = task.await.unwrap().unwrap();

        assert!(report.is_none());
        assert_eq!(tokio::time::Instant::now(), stopped_at);
        assert!(source.shut_down.load(Ordering::SeqCst));
        assert!(reports.try_recv().is_err());
        assert_eq!(handle.state().await, MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_counted_from_end_of_cycle() {
        // 2 pairs x 2 timeframes x 10 s = 40 s per cycle.
        let source = Arc::new(CountingSource {
            delay: Duration::from_secs(10),
            ..CountingSource::default()
        });
        let (monitor, handle) = Monitor::new(runner(source.clone()));
        let mut reports = handle.subscribe_reports();

        let task = tokio::spawn(monitor.run());
        reports.recv().await.unwrap();
        let first = tokio::time::Instant::now();
        reports.recv().await.unwrap();
        let second = tokio::time::Instant::now();

        assert_eq!(second - first, Duration::from_secs(1800 + 40));

        handle.stop();
        task.await.unwrap().unwrap();
    }
}
