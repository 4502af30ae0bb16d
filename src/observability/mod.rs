pub mod metrics;
pub mod collector;
pub mod monitor;

pub use metrics::{DeviceMetrics, SessionMetrics};
pub use collector::{MetricsCollector, MetricsSnapshot};
pub use monitor::CaptureMonitor;
