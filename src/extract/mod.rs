pub mod audio;
pub mod discovery;
pub mod telemetry;

pub use audio::{parse_sample, parse_samples, AudioExtractor};
pub use discovery::{discover_devices, StreamProbe};
pub use telemetry::{TelemetryExtractor, CATEGORIES};

use roxmltree::Document;

use crate::core::{Namespace, RawPayload};
use crate::error::{CaptureError, CaptureResult};

/// Pulls one device's contribution out of a window's response document.
///
/// One call runs per known device per window, concurrently with its
/// siblings, all reading the same immutable payload.
pub trait DeviceExtractor: Send + Sync + 'static {
    type Output: Send + 'static;

    fn extract(&self, doc: &Document<'_>, device_id: &str, ns: &Namespace) -> CaptureResult<Self::Output>;

    /// Number of updates or samples in an output, for metrics
    fn count(output: &Self::Output) -> usize;

    /// Parse the payload and extract in one step
    fn extract_payload(&self, payload: &RawPayload, device_id: &str, ns: &Namespace) -> CaptureResult<Self::Output> {
        // Parsed once per device: a `Document` borrows the text and cannot be
        // moved into a `'static` blocking task, so workers share the text instead.
        let doc = payload
            .parse()
            .map_err(|e| CaptureError::extraction(device_id, e.to_string()))?;
        self.extract(&doc, device_id, ns)
    }
}
