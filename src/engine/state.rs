use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::core::StreamWindow;

/// Capture session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Connecting,
    Polling {
        #[serde(skip)]
        start_time: Option<Instant>,
        windows_fetched: u64,
    },
    /// Stop observed; fetching the final window
    Draining { window: StreamWindow },
    Completed { windows_fetched: u64 },
    Failed { error_msg: String, window: Option<StreamWindow> },
}

impl CaptureState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        use CaptureState::*;

        matches!(
            (self, target),
            (Idle, Connecting) |

            (Connecting, Polling { .. }) |
            (Connecting, Failed { .. }) |

            (Polling { .. }, Polling { .. }) |
            (Polling { .. }, Draining { .. }) |
            (Polling { .. }, Failed { .. }) |

            (Draining { .. }, Completed { .. }) |
            (Draining { .. }, Failed { .. }) |

            (Completed { .. }, Idle) |
            (Failed { .. }, Idle)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Polling { .. } => "Polling",
            Self::Draining { .. } => "Draining",
            Self::Completed { .. } => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::Idle
    }
}
