use serde::{Deserialize, Serialize};
use std::fmt;

use super::header::StreamHeader;

/// Half-open range of sequence numbers requested in one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamWindow {
    pub from: u64,
    pub to: u64,
}

impl StreamWindow {
    /// Build a window, clamping `to` so the range is never inverted
    pub fn new(from: u64, to: u64) -> Self {
        Self {
            from,
            to: to.max(from),
        }
    }

    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Request path relative to the agent base URL
    pub fn sample_path(&self) -> String {
        format!("sample?from={}&to={}", self.from, self.to)
    }
}

impl fmt::Display for StreamWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// Where the first window starts relative to the agent buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// `[firstSequence, nextSequence)`: everything still buffered
    #[default]
    Beginning,
    /// `[lastSequence, nextSequence)`: only the newest update onwards
    Latest,
}

/// Tracks the stream's known sequence bounds and the window to fetch next.
///
/// Every window after the first starts at the `nextSequence` reported by the
/// previous response and ends at that response's `lastSequence`, widened to
/// a single sequence when that range would be empty. Feeding `lastSequence`
/// into `from` instead would request an empty or inverted range, so that
/// ordering is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCursor {
    first: u64,
    next: u64,
    last: u64,
    window_from: u64,
    window_to: u64,
    caught_up: bool,
}

impl SequenceCursor {
    /// Create the cursor from the stream's initial header
    pub fn from_header(header: &StreamHeader, start: StartPosition) -> Self {
        let from = match start {
            StartPosition::Beginning => header.first,
            StartPosition::Latest => header.last,
        };
        let window = StreamWindow::new(from, header.next);

        Self {
            first: header.first,
            next: header.next,
            last: header.last,
            window_from: window.from,
            window_to: window.to,
            caught_up: false,
        }
    }

    /// Window to request on the next fetch
    pub fn window(&self) -> StreamWindow {
        StreamWindow {
            from: self.window_from,
            to: self.window_to,
        }
    }

    /// Re-synchronize from the header of the response just fetched and
    /// return the following window.
    pub fn advance(&mut self, header: &StreamHeader) -> StreamWindow {
        let window = StreamWindow::new(header.next, header.last.max(header.next.saturating_add(1)));

        // nothing newer than what was just consumed, or no forward progress
        self.caught_up = header.last < header.next || header.next <= self.window_from;
        self.first = header.first;
        self.next = header.next;
        self.last = header.last;
        self.window_from = window.from;
        self.window_to = window.to;

        window
    }

    /// Whether the last response showed the stream had nothing new, so the
    /// caller should wait before fetching again
    pub fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}
