use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Extraction counters for one device
pub struct DeviceMetrics {
    device_id: String,
    windows_extracted: AtomicU64,
    items_extracted: AtomicU64,
    failures: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

impl DeviceMetrics {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            windows_extracted: AtomicU64::new(0),
            items_extracted: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn windows_extracted(&self) -> u64 {
        self.windows_extracted.load(Ordering::Relaxed)
    }

    /// Field updates or audio samples, depending on the extractor
    pub fn items_extracted(&self) -> u64 {
        self.items_extracted.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_extracted(&self, items: usize) {
        self.windows_extracted.fetch_add(1, Ordering::Relaxed);
        self.items_extracted.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_extraction(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_extraction(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }
}

/// Counters for the polling loop itself
#[derive(Default)]
pub struct SessionMetrics {
    windows_fetched: AtomicU64,
    header_retries: AtomicU64,
    bytes_fetched: AtomicU64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn windows_fetched(&self) -> u64 {
        self.windows_fetched.load(Ordering::Relaxed)
    }

    pub fn header_retries(&self) -> u64 {
        self.header_retries.load(Ordering::Relaxed)
    }

    pub fn bytes_fetched(&self) -> u64 {
        self.bytes_fetched.load(Ordering::Relaxed)
    }

    pub fn record_window(&self, bytes: usize) {
        self.windows_fetched.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_header_retry(&self) {
        self.header_retries.fetch_add(1, Ordering::Relaxed);
    }
}
