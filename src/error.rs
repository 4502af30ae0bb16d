use thiserror::Error;

use crate::core::StreamWindow;

/// Failure taxonomy of the capture core.
///
/// Only `Unreachable` and `RetriesExhausted` ever reach the process boundary
/// once the polling loop is running. `HeaderMissing` is retried there and is
/// fatal only during start-up; `Extraction` is absorbed per device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("could not connect to {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("stream header missing: {reason}")]
    HeaderMissing { reason: String },

    #[error("stream header still missing after {attempts} attempts (window {window})")]
    RetriesExhausted { attempts: u32, window: StreamWindow },

    #[error("extraction failed for device {device}: {reason}")]
    Extraction { device: String, reason: String },
}

impl CaptureError {
    pub fn header_missing(reason: impl Into<String>) -> Self {
        Self::HeaderMissing {
            reason: reason.into(),
        }
    }

    pub fn extraction(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Whether a steady-state caller may re-issue the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HeaderMissing { .. })
    }

    /// Window the failure was observed on, when the error carries one.
    pub fn window(&self) -> Option<StreamWindow> {
        match self {
            Self::RetriesExhausted { window, .. } => Some(*window),
            _ => None,
        }
    }
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
