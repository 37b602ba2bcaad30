pub mod analysis;
pub mod config;
pub mod indicators;
pub mod metrics;
pub mod notify;
pub mod ranking;

pub use analysis::{analyze_timeframe, TimeframeAnalysis};
pub use config::{
    IndicatorConfig, ReportConfig, ScannerFileConfig, ScheduleConfig, ScoreWeights, Thresholds,
    TimeframeConfig,
};
pub use metrics::compute_metrics;
pub use notify::check_notifications;
pub use ranking::{
    combine_timeframes, rank_currencies, score_pairs, select_uncorrelated, top_active,
};
