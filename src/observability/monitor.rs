use super::MetricsCollector;

/// Renders collected metrics as a plain-text session summary
pub struct CaptureMonitor {
    collector: MetricsCollector,
}

impl CaptureMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let session = self.collector.session();
        let mut report = format!(
            "=== Capture Summary ===\nWindows: {} fetched ({} bytes)\nHeader retries: {}\n",
            session.windows_fetched(),
            session.bytes_fetched(),
            session.header_retries()
        );

        let snapshot = self.collector.snapshot();
        if snapshot.is_empty() {
            report.push_str("No devices registered\n");
            return report;
        }

        for metrics in snapshot.iter() {
            report.push_str(&format!(
                "\n[{}]\n  Extracted: {} items over {} windows\n  Failures: {}\n  Avg Latency: {}μs\n",
                metrics.device_id,
                metrics.items_extracted,
                metrics.windows_extracted,
                if metrics.failures > 0 {
                    format!("{} failure{}", metrics.failures, if metrics.failures == 1 { "" } else { "s" })
                } else {
                    "0 failures".to_string()
                },
                metrics.avg_latency_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
