use std::collections::HashMap;
use std::sync::Arc;
use super::{DeviceMetrics, SessionMetrics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub device_id: String,
    pub windows_extracted: u64,
    pub items_extracted: u64,
    pub failures: u64,
    pub avg_latency_us: u64,
}

/// Device and session metrics for one capture, in device registration order
#[derive(Clone)]
pub struct MetricsCollector {
    order: Vec<String>,
    devices: HashMap<String, Arc<DeviceMetrics>>,
    session: Arc<SessionMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            devices: HashMap::new(),
            session: Arc::new(SessionMetrics::new()),
        }
    }

    /// Metrics handle for `device_id`, registering it on first use
    pub fn device(&mut self, device_id: &str) -> Arc<DeviceMetrics> {
        if let Some(metrics) = self.devices.get(device_id) {
            return metrics.clone();
        }
        let metrics = Arc::new(DeviceMetrics::new(device_id));
        self.order.push(device_id.to_string());
        self.devices.insert(device_id.to_string(), metrics.clone());
        metrics
    }

    pub fn get_device_metrics(&self, device_id: &str) -> Option<Arc<DeviceMetrics>> {
        self.devices.get(device_id).cloned()
    }

    pub fn session(&self) -> Arc<SessionMetrics> {
        self.session.clone()
    }

    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.devices.get(id))
            .map(|metrics| MetricsSnapshot {
                device_id: metrics.device_id().to_string(),
                windows_extracted: metrics.windows_extracted(),
                items_extracted: metrics.items_extracted(),
                failures: metrics.failures(),
                avg_latency_us: metrics.avg_latency_us(),
            })
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
