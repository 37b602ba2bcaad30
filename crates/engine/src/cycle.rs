use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{Instrument, MarketDataSource, MetricSet, Result, ScoredPair, Timeframe};
use scanner::{
    analyze_timeframe, combine_timeframes, compute_metrics, select_uncorrelated,
    ScannerFileConfig, TimeframeAnalysis, TimeframeConfig,
};

/// A pair left out of a timeframe, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPair {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeframeReport {
    pub timeframe: Timeframe,
    pub analysis: TimeframeAnalysis,
    pub skipped: Vec<SkippedPair>,
}

/// Output of one full evaluation pass. Nothing carries over to the next cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub timeframes: Vec<TimeframeReport>,
    /// Uncorrelated top pairs by weighted score across all timeframes.
    pub combined: Vec<ScoredPair>,
}

/// Fetches bars for every configured pair and timeframe and turns them into
/// a `CycleReport`. Holds no state between runs.
pub struct CycleRunner {
    source: Arc<dyn MarketDataSource>,
    cfg: ScannerFileConfig,
    instruments: Vec<Instrument>,
}

impl CycleRunner {
    pub fn new(source: Arc<dyn MarketDataSource>, cfg: ScannerFileConfig) -> Result<Self> {
        cfg.validate()?;
        let instruments = cfg.instruments()?;
        Ok(Self {
            source,
            cfg,
            instruments,
        })
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        &self.source
    }

    pub fn config(&self) -> &ScannerFileConfig {
        &self.cfg
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Run one cycle. Pairs that cannot be fetched or evaluated are logged
    /// and skipped; the cycle itself never fails.
    pub async fn run(&self) -> CycleReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(cycle = %id, pairs = self.instruments.len(), "Cycle started");

        let mut timeframes = Vec::with_capacity(self.cfg.timeframes.len());
        for tf_cfg in &self.cfg.timeframes {
            timeframes.push(self.run_timeframe(tf_cfg).await);
        }

        let per_timeframe: Vec<(f64, &[ScoredPair])> = self
            .cfg
            .timeframes
            .iter()
            .zip(&timeframes)
            .map(|(tf_cfg, report)| (tf_cfg.weight, report.analysis.scored.as_slice()))
            .collect();
        let combined = select_uncorrelated(
            &combine_timeframes(&per_timeframe),
            self.cfg.report.top_pairs,
        );

        info!(
            cycle = %id,
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Cycle finished"
        );

        CycleReport {
            id,
            started_at,
            timeframes,
            combined,
        }
    }

    async fn run_timeframe(&self, tf_cfg: &TimeframeConfig) -> TimeframeReport {
        let timeframe = tf_cfg.timeframe;
        info!("Monitoring {} timeframe...", timeframe.label());

        let mut metrics: BTreeMap<Instrument, MetricSet> = BTreeMap::new();
        let mut skipped = Vec::new();

        for instrument in &self.instruments {
            match self.evaluate(instrument, tf_cfg).await {
                Ok(m) => {
                    metrics.insert(instrument.clone(), m);
                }
                Err(e) => {
                    error!(
                        symbol = %instrument.symbol,
                        %timeframe,
                        error = %e,
                        "Failed to evaluate pair"
                    );
                    skipped.push(SkippedPair {
                        symbol: instrument.symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if metrics.is_empty() {
            warn!(%timeframe, "No pairs could be evaluated");
        }

        TimeframeReport {
            timeframe,
            analysis: analyze_timeframe(&metrics, &self.cfg),
            skipped,
        }
    }

    async fn evaluate(
        &self,
        instrument: &Instrument,
        tf_cfg: &TimeframeConfig,
    ) -> Result<MetricSet> {
        let bars = self
            .source
            .fetch_bars(&instrument.symbol, tf_cfg.timeframe, tf_cfg.bars)
            .await?;
        compute_metrics(&instrument.symbol, &bars, &self.cfg.indicators)
    }
}
