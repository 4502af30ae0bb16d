use chrono::Utc;
use std::time::Instant;
use tracing::info;

use super::capture::CaptureEngine;
use super::merger::{Merge, Merger};
use super::state::CaptureState;
use crate::agent::Fetcher;
use crate::core::{read_header, round_to_millis, StreamWindow, Timestamp};
use crate::error::CaptureResult;
use crate::extract::{DeviceExtractor, StreamProbe};
use crate::stop::StopSignal;

/// Result of a single-shot capture
#[derive(Debug)]
pub struct BatchSession<T> {
    pub data: T,
    pub probe: StreamProbe,
    /// Wall clock when logging began, rounded to the millisecond
    pub session_start: Timestamp,
    /// Sequence range requested once the stop fired
    pub window: StreamWindow,
}

impl<F, E> CaptureEngine<F, E>
where
    F: Fetcher,
    E: DeviceExtractor,
{
    /// Wait for `stop`, then pull the agent's whole buffer with one
    /// count-bounded request and extract it. Nothing is retried.
    pub async fn run_batch<T>(
        &mut self,
        stop: &StopSignal,
        make_target: impl FnOnce(&StreamProbe) -> T,
    ) -> CaptureResult<BatchSession<T>>
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

        let session_start = round_to_millis(Utc::now());
        info!(%session_start, "logging started, waiting for stop");
        self.transition_to(CaptureState::Polling {
            start_time: Some(Instant::now()),
            windows_fetched: 0,
        });

        stop.stopped().await;

        let merger = Merger::new(make_target(&probe));
        match self.drain_buffer(&probe, &merger).await {
            Ok(window) => {
                self.transition_to(CaptureState::Completed { windows_fetched: 1 });
                Ok(BatchSession {
                    data: merger.into_inner(),
                    probe,
                    session_start,
                    window,
                })
            }
            Err(e) => {
                self.fail(&e, None);
                Err(e)
            }
        }
    }

    async fn drain_buffer<T>(&mut self, probe: &StreamProbe, merger: &Merger<T>) -> CaptureResult<StreamWindow>
    where
        T: Merge<E::Output>,
    {
        let closing = self.fetcher.current().await?;
        let header = read_header(&closing, &probe.namespace)?;

        let first = probe.header.first;
        let count = header.last.saturating_sub(first) + 1;
        let window = StreamWindow::new(first, first + count);
        self.transition_to(CaptureState::Draining { window });
        info!(%window, count, "logging stopped, fetching buffer");

        let payload = self.fetcher.sample_count(first, count).await?;
        read_header(&payload, &probe.namespace)?;
        self.extract_all(&payload, probe, merger).await;

        Ok(window)
    }
}
