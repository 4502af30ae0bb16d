use async_trait::async_trait;

use crate::core::{RawPayload, StreamWindow};
use crate::error::CaptureResult;

/// Issues requests against an agent and hands back the raw response body.
///
/// Implementations make exactly one request per call. A connection that
/// cannot be established is `CaptureError::Unreachable`; retry policy belongs
/// to the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Agent base URL, used in diagnostics
    fn base_url(&self) -> &str;

    /// `GET current`: header plus a snapshot of every device
    async fn current(&self) -> CaptureResult<RawPayload>;

    /// `GET sample?from=&to=` for one window
    async fn sample(&self, window: &StreamWindow) -> CaptureResult<RawPayload>;

    /// `GET sample?from=&count=`, the count-bounded form
    async fn sample_count(&self, from: u64, count: u64) -> CaptureResult<RawPayload>;
}
