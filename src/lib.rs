pub mod agent;
pub mod app;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod extract;
pub mod observability;
pub mod resilience;
pub mod sink;
pub mod stop;

pub use config::CaptureConfig;
pub use error::{CaptureError, CaptureResult};
pub use stop::StopSignal;
