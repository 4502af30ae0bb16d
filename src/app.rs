//! Shared start-up and shutdown plumbing for the capture binaries.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::agent::HttpFetcher;
use crate::config::CaptureConfig;
use crate::engine::Termination;
use crate::error::CaptureError;
use crate::observability::CaptureMonitor;
use crate::stop::StopSignal;

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load config and build the HTTP client
pub async fn prepare() -> anyhow::Result<(CaptureConfig, Arc<HttpFetcher>)> {
    let config = CaptureConfig::from_env().await?;
    let fetcher = HttpFetcher::new(&config.agent_url, config.connect_timeout())?;
    Ok((config, Arc::new(fetcher)))
}

/// Stop signal wired to Enter and Ctrl-C
pub fn stop_on_user_request() -> StopSignal {
    let stop = StopSignal::new();
    stop.listen_for_enter();
    stop.listen_for_ctrl_c();
    info!("press Enter or Ctrl-C to stop logging");
    stop
}

pub fn log_report(monitor: &CaptureMonitor) {
    for line in monitor.generate_report().lines() {
        info!("{line}");
    }
}

/// Exit status for a start-up failure; nothing was captured
pub fn startup_failure(e: &CaptureError) -> ExitCode {
    error!(error = %e, "could not start capture");
    ExitCode::FAILURE
}

/// Exit status once output has been written
pub fn finish(termination: &Termination) -> ExitCode {
    match termination {
        Termination::Stopped => ExitCode::SUCCESS,
        Termination::Failed(e) => {
            error!(error = %e, "capture ended early, output holds data merged before the failure");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamWindow;

    #[test]
    fn test_exit_codes() {
        assert_eq!(finish(&Termination::Stopped), ExitCode::SUCCESS);

        let failed = Termination::Failed(CaptureError::RetriesExhausted {
            attempts: 100,
            window: StreamWindow::new(5, 9),
        });
        assert_eq!(finish(&failed), ExitCode::FAILURE);
    }
}
