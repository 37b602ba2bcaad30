pub mod bridge;
pub mod cycle;
pub mod lifecycle;
pub mod report;

pub use bridge::BridgeClient;
pub use cycle::{CycleReport, CycleRunner, SkippedPair, TimeframeReport};
pub use lifecycle::{Monitor, MonitorHandle, MonitorState};
