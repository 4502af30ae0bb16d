use std::process::ExitCode;
use tracing::error;

use mtcapture::app;
use mtcapture::core::AudioBuffers;
use mtcapture::engine::{finalize_all, CaptureEngine};
use mtcapture::extract::AudioExtractor;
use mtcapture::sink::write_channels;

/// Record every device's displacement time series from the latest sequence
/// onward and write one WAV file per device.
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

    let mut engine = CaptureEngine::new(fetcher, AudioExtractor::new(), config.settings(config.audio_start));
    let stop = app::stop_on_user_request();

    let session = match engine
        .run(&stop, |probe| AudioBuffers::new(&probe.devices, probe.header.creation_time))
        .await
    {
        Ok(session) => session,
        Err(e) => return app::startup_failure(&e),
    };
    app::log_report(&engine.monitor());

    let channels = finalize_all(session.data);
    if let Err(e) = write_channels(&config.audio_dir, channels, config.sample_rate).await {
        error!(error = %format!("{e:#}"), "could not write audio");
        return ExitCode::FAILURE;
    }

    app::finish(&session.termination)
}
