use std::process::ExitCode;
use tracing::error;

use mtcapture::app;
use mtcapture::core::SparseTable;
use mtcapture::engine::{densify, CaptureEngine};
use mtcapture::extract::TelemetryExtractor;
use mtcapture::sink::write_table;

/// Poll the agent window by window until stopped, then write the
/// forward-filled telemetry log as CSV.
#[tokio::main]
async fn main() -> ExitCode {
    app::init_tracing();

    let (config, fetcher) = match app::prepare().await {
        Ok(prepared) => prepared,
        Err(e) => {
            error!(error = %format!("{e:#}"), "could not set up capture");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = CaptureEngine::new(
        fetcher,
        TelemetryExtractor::new(),
        config.settings(config.telemetry_start),
    );
    let stop = app::stop_on_user_request();

    let session = match engine
        .run(&stop, |probe| SparseTable::for_devices(config.column_naming, &probe.devices))
        .await
    {
        Ok(session) => session,
        Err(e) => return app::startup_failure(&e),
    };
    app::log_report(&engine.monitor());

    let table = densify(session.data);
    if let Err(e) = write_table(&config.csv_path(), &table) {
        error!(error = %format!("{e:#}"), "could not write CSV");
        return ExitCode::FAILURE;
    }

    app::finish(&session.termination)
}
