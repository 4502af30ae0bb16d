use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::merger::{Merge, Merger};
use super::state::CaptureState;
use crate::agent::Fetcher;
use crate::core::{read_header, Namespace, RawPayload, SequenceCursor, StartPosition, StreamHeader, StreamWindow};
use crate::error::{CaptureError, CaptureResult};
use crate::extract::{DeviceExtractor, StreamProbe};
use crate::observability::{CaptureMonitor, DeviceMetrics, MetricsCollector};
use crate::resilience::{retry_transient, RetryExhausted, RetryPolicy};
use crate::stop::StopSignal;

/// Tunables of the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Steady-state header retry; start-up never retries
    pub retry: RetryPolicy,
    /// Upper bound on concurrently running extractions
    pub max_workers: usize,
    pub start: StartPosition,
    /// Pause before the next fetch once the stream has caught up
    pub poll_interval_ms: u64,
}

impl CaptureSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_workers: 8,
            start: StartPosition::Beginning,
            poll_interval_ms: 200,
        }
    }
}

/// How the polling loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Stop signal observed and the final window drained
    Stopped,
    /// Fatal error mid-loop; data merged before it is still returned
    Failed(CaptureError),
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Stopped => None,
        }
    }
}

/// Everything a finished streaming capture produced
#[derive(Debug)]
pub struct CaptureSession<T> {
    pub data: T,
    pub probe: StreamProbe,
    pub cursor: SequenceCursor,
    /// Windows fetched and merged, in request order
    pub windows: Vec<StreamWindow>,
    pub termination: Termination,
}

impl<T> CaptureSession<T> {
    /// The window that would have been requested next
    pub fn last_window(&self) -> StreamWindow {
        self.cursor.window()
    }
}

/// Drives the sequence cursor against an agent and merges each window's
/// per-device extractions into one target.
///
/// Every window is fully extracted and merged (all workers joined) before
/// the cursor advances and the next fetch is issued.
pub struct CaptureEngine<F, E> {
    pub(crate) fetcher: Arc<F>,
    extractor: Arc<E>,
    settings: CaptureSettings,
    metrics: MetricsCollector,
    state: CaptureState,
}

impl<F, E> CaptureEngine<F, E>
where
    F: Fetcher,
    E: DeviceExtractor,
{
    pub fn new(fetcher: Arc<F>, extractor: E, settings: CaptureSettings) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(extractor),
            settings,
            metrics: MetricsCollector::new(),
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn monitor(&self) -> CaptureMonitor {
        CaptureMonitor::new(self.metrics.clone())
    }

    pub(crate) fn transition_to(&mut self, new_state: CaptureState) {
        if !self.state.can_transition_to(&new_state) {
            warn!(from = self.state.name(), to = new_state.name(), "unexpected capture state transition");
        }
        self.state = new_state;
    }

    pub(crate) fn fail(&mut self, error: &CaptureError, window: Option<StreamWindow>) {
        self.transition_to(CaptureState::Failed {
            error_msg: error.to_string(),
            window,
        });
    }

    /// Read `current` once: namespace, initial header and the device set.
    /// Any failure here is fatal.
    pub async fn connect(&mut self) -> CaptureResult<StreamProbe> {
        let payload = self.fetcher.current().await?;
        let probe = StreamProbe::from_payload(&payload)?;

        for device in &probe.devices {
            self.metrics.device(device);
        }

        info!(
            agent = self.fetcher.base_url(),
            devices = probe.devices.len(),
            first = probe.header.first,
            next = probe.header.next,
            last = probe.header.last,
            "connected"
        );
        Ok(probe)
    }

    /// Poll until `stop` fires, drain one final window, and return what was
    /// merged. `Err` means start-up failed and nothing was captured.
    pub async fn run<T>(
        &mut self,
        stop: &StopSignal,
        make_target: impl FnOnce(&StreamProbe) -> T,
    ) -> CaptureResult<CaptureSession<T>>
    where
        T: Merge<E::Output> + Default,
    {
        self.transition_to(CaptureState::Connecting);
        let probe = match self.connect().await {
            Ok(probe) => probe,
            Err(e) => {
                self.fail(&e, None);
                return Err(e);
            }
        };
        if probe.devices.is_empty() {
            warn!("agent reported no devices; nothing will be captured");
        }

        let mut cursor = SequenceCursor::from_header(&probe.header, self.settings.start);
        let merger = Merger::new(make_target(&probe));
        let mut windows = Vec::new();

        info!(window = %cursor.window(), "logging started");
        let start_time = Some(Instant::now());
        self.transition_to(CaptureState::Polling {
            start_time,
            windows_fetched: 0,
        });

        let mut failure = None;
        while !stop.is_stopped() {
            match self.poll_window(&probe, &mut cursor, &merger).await {
                Ok(window) => {
                    windows.push(window);
                    self.transition_to(CaptureState::Polling {
                        start_time,
                        windows_fetched: windows.len() as u64,
                    });
                    if cursor.is_caught_up() {
                        self.wait_for_data(stop).await;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_none() {
            info!(window = %cursor.window(), "logging stopped, draining final window");
            self.transition_to(CaptureState::Draining { window: cursor.window() });
            match self.poll_window(&probe, &mut cursor, &merger).await {
                Ok(window) => windows.push(window),
                Err(e) => failure = Some(e),
            }
        }

        let termination = match failure {
            Some(e) => {
                let window = e.window().unwrap_or_else(|| cursor.window());
                error!(%window, error = %e, "capture aborted");
                self.fail(&e, Some(window));
                Termination::Failed(e)
            }
            None => {
                self.transition_to(CaptureState::Completed {
                    windows_fetched: windows.len() as u64,
                });
                Termination::Stopped
            }
        };

        Ok(CaptureSession {
            data: merger.into_inner(),
            probe,
            cursor,
            windows,
            termination,
        })
    }

    /// Sleep for the poll interval, cut short by a stop request
    async fn wait_for_data(&self, stop: &StopSignal) {
        debug!(interval_ms = self.settings.poll_interval_ms, "stream caught up, pausing");
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_interval()) => {}
            _ = stop.stopped() => {}
        }
    }

    /// Fetch, extract and merge the cursor's window, then advance the
    /// cursor from the response header. Returns the window just merged.
    async fn poll_window<T>(
        &self,
        probe: &StreamProbe,
        cursor: &mut SequenceCursor,
        merger: &Merger<T>,
    ) -> CaptureResult<StreamWindow>
    where
        T: Merge<E::Output>,
    {
        let window = cursor.window();
        debug!(%window, "fetching window");

        let (payload, header) = self.fetch_window(&window, &probe.namespace).await?;
        self.metrics.session().record_window(payload.len());

        self.extract_all(&payload, probe, merger).await;

        let next = cursor.advance(&header);
        debug!(%window, %next, "window merged");
        Ok(window)
    }

    /// Fetch `window` and read its header, re-issuing the request while the
    /// header is missing, up to the retry policy.
    async fn fetch_window(
        &self,
        window: &StreamWindow,
        ns: &Namespace,
    ) -> CaptureResult<(RawPayload, StreamHeader)> {
        let fetcher = &self.fetcher;
        let session = self.metrics.session();

        retry_transient(&self.settings.retry, |attempt| {
            if attempt > 1 {
                session.record_header_retry();
            }
            async move {
                let payload = fetcher.sample(window).await?;
                let header = read_header(&payload, ns)?;
                Ok((payload, header))
            }
        })
        .await
        .map_err(|e| match e {
            RetryExhausted::Fatal(e) => e,
            RetryExhausted::Attempts { attempts, .. } => CaptureError::RetriesExhausted {
                attempts,
                window: *window,
            },
        })
    }

    /// Run one extraction per known device against `payload` and wait for
    /// all of them. A failing device is logged and skipped for this window.
    pub(crate) async fn extract_all<T>(&self, payload: &RawPayload, probe: &StreamProbe, merger: &Merger<T>)
    where
        T: Merge<E::Output>,
    {
        let permits = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));
        let mut workers = JoinSet::new();

        for device in &probe.devices {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let device = device.clone();
            let payload = payload.clone();
            let namespace = probe.namespace.clone();
            let extractor = self.extractor.clone();
            let merger = merger.clone();
            let metrics = self
                .metrics
                .get_device_metrics(&device)
                .unwrap_or_else(|| Arc::new(DeviceMetrics::new(device.as_str())));

            workers.spawn_blocking(move || {
                let _permit = permit;
                let started = metrics.start_extraction();

                match extractor.extract_payload(&payload, &device, &namespace) {
                    Ok(output) => {
                        metrics.record_extracted(E::count(&output));
                        merger.merge(&device, output);
                    }
                    Err(e) => {
                        metrics.record_failure();
                        warn!(device = %device, error = %e, "extraction failed, device skipped for this window");
                    }
                }

                metrics.finish_extraction(started);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "extraction worker did not complete");
            }
        }
    }
}
