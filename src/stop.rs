use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cooperative stop request shared between the listeners and the capture
/// loop. The loop only looks at it between windows.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Stop when a line is entered on stdin.
    ///
    /// Runs on a detached thread so a pending read never holds up runtime
    /// shutdown. End of input does not count as a stop request.
    pub fn listen_for_enter(&self) {
        let signal = self.clone();
        std::thread::spawn(move || {
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) => {}
                Ok(_) => {
                    info!("stop requested from keyboard");
                    signal.stop();
                }
                Err(e) => warn!(error = %e, "stdin listener failed"),
            }
        });
    }

    /// Stop on Ctrl-C
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("received SIGINT, stopping capture");
                        signal.stop();
                    }
                    Err(e) => warn!(error = %e, "could not install Ctrl-C handler"),
                },
                _ = signal.stopped() => {}
            }
        })
    }
}
