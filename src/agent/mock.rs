use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::traits::Fetcher;
use crate::core::{RawPayload, StreamWindow};
use crate::error::{CaptureError, CaptureResult};
use crate::stop::StopSignal;

pub const STREAMS_NAMESPACE: &str = "urn:mtconnect.org:MTConnectStreams:1.3";

#[derive(Debug, Clone)]
enum Reply {
    Payload(String),
    Unreachable,
}

/// In-memory agent that replays queued responses.
///
/// `current` and `sample` requests each pop from their own queue. Once the
/// sample queue is empty the repeat reply (if any) is served forever,
/// otherwise the agent reports itself unreachable.
pub struct ScriptedAgent {
    base_url: String,
    current: Mutex<VecDeque<Reply>>,
    samples: Mutex<VecDeque<Reply>>,
    repeat: Mutex<Option<Reply>>,
    requests: Mutex<Vec<String>>,
    sample_calls: AtomicUsize,
    stop_after: Mutex<Option<(usize, StopSignal)>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            base_url: "mock://agent/".to_string(),
            current: Mutex::new(VecDeque::new()),
            samples: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            sample_calls: AtomicUsize::new(0),
            stop_after: Mutex::new(None),
        }
    }

    pub fn push_current(&self, body: impl Into<String>) {
        lock(&self.current).push_back(Reply::Payload(body.into()));
    }

    pub fn push_current_unreachable(&self) {
        lock(&self.current).push_back(Reply::Unreachable);
    }

    pub fn push_sample(&self, body: impl Into<String>) {
        lock(&self.samples).push_back(Reply::Payload(body.into()));
    }

    pub fn push_sample_unreachable(&self) {
        lock(&self.samples).push_back(Reply::Unreachable);
    }

    /// Serve `body` for every sample request once the queue runs dry
    pub fn repeat_sample(&self, body: impl Into<String>) {
        *lock(&self.repeat) = Some(Reply::Payload(body.into()));
    }

    /// Fire `stop` once `count` sample requests have been answered
    pub fn stop_after_samples(&self, count: usize, stop: StopSignal) {
        *lock(&self.stop_after) = Some((count, stop));
    }

    /// Every request path in the order received
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    pub fn sample_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|path| path.starts_with("sample"))
            .collect()
    }

    fn answer(&self, path: String, reply: Option<Reply>) -> CaptureResult<RawPayload> {
        let url = format!("{}{}", self.base_url, path);
        lock(&self.requests).push(path);

        match reply {
            Some(Reply::Payload(body)) => Ok(RawPayload::new(body)),
            Some(Reply::Unreachable) => Err(CaptureError::Unreachable {
                url,
                reason: "connection refused".to_string(),
            }),
            None => Err(CaptureError::Unreachable {
                url,
                reason: "script exhausted".to_string(),
            }),
        }
    }

    fn next_sample(&self, path: String) -> CaptureResult<RawPayload> {
        let reply = lock(&self.samples)
            .pop_front()
            .or_else(|| lock(&self.repeat).clone());
        let result = self.answer(path, reply);

        let calls = self.sample_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((count, stop)) = lock(&self.stop_after).as_ref() {
            if calls >= *count {
                stop.stop();
            }
        }

        result
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ScriptedAgent {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn current(&self) -> CaptureResult<RawPayload> {
        let reply = lock(&self.current).pop_front();
        self.answer("current".to_string(), reply)
    }

    async fn sample(&self, window: &StreamWindow) -> CaptureResult<RawPayload> {
        self.next_sample(window.sample_path())
    }

    async fn sample_count(&self, from: u64, count: u64) -> CaptureResult<RawPayload> {
        self.next_sample(format!("sample?from={from}&count={count}"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct Item {
    category: &'static str,
    tag: String,
    timestamp: String,
    value: Option<String>,
    data_item_id: String,
}

/// Items reported by one `DeviceStream`
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    name: String,
    uuid: String,
    items: Vec<Item>,
}

impl DeviceSpec {
    fn push(mut self, category: &'static str, tag: &str, timestamp: &str, value: Option<&str>, id: &str) -> Self {
        self.items.push(Item {
            category,
            tag: tag.to_string(),
            timestamp: timestamp.to_string(),
            value: value.map(str::to_string),
            data_item_id: id.to_string(),
        });
        self
    }

    pub fn sample(self, tag: &str, timestamp: &str, value: &str) -> Self {
        let id = tag.to_lowercase();
        self.push("Samples", tag, timestamp, Some(value), &id)
    }

    pub fn event(self, tag: &str, timestamp: &str, value: Option<&str>) -> Self {
        let id = tag.to_lowercase();
        self.push("Events", tag, timestamp, value, &id)
    }

    pub fn condition(self, state: &str, timestamp: &str, message: Option<&str>) -> Self {
        self.push("Condition", state, timestamp, message, "condition")
    }

    /// `DisplacementTimeSeries` carrying a whitespace-separated sample list
    pub fn time_series(self, data_item_id: &str, timestamp: &str, body: &str) -> Self {
        self.push("Samples", "DisplacementTimeSeries", timestamp, Some(body), data_item_id)
    }
}

/// Builder for MTConnect streams documents used by tests and demos
#[derive(Debug, Clone)]
pub struct StreamsDocument {
    namespace: Option<String>,
    creation_time: String,
    sequences: Option<(u64, u64, u64)>,
    devices: Vec<DeviceSpec>,
}

impl StreamsDocument {
    pub fn new(first: u64, next: u64, last: u64) -> Self {
        Self {
            namespace: Some(STREAMS_NAMESPACE.to_string()),
            creation_time: "2024-05-01T12:00:00Z".to_string(),
            sequences: Some((first, next, last)),
            devices: Vec::new(),
        }
    }

    pub fn creation_time(mut self, creation_time: &str) -> Self {
        self.creation_time = creation_time.to_string();
        self
    }

    pub fn namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.map(str::to_string);
        self
    }

    pub fn without_header(mut self) -> Self {
        self.sequences = None;
        self
    }

    pub fn device(mut self, uuid: &str, build: impl FnOnce(DeviceSpec) -> DeviceSpec) -> Self {
        let spec = DeviceSpec {
            name: uuid.to_string(),
            uuid: uuid.to_string(),
            items: Vec::new(),
        };
        self.devices.push(build(spec));
        self
    }

    /// Error document an agent returns for a bad request
    pub fn error_document() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><MTConnectError xmlns="{STREAMS_NAMESPACE}"><Errors><Error errorCode="OUT_OF_RANGE">from is out of range</Error></Errors></MTConnectError>"#
        )
    }

    pub fn render(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        match &self.namespace {
            Some(ns) => {
                let _ = write!(xml, r#"<MTConnectStreams xmlns="{}">"#, escape(ns));
            }
            None => xml.push_str("<MTConnectStreams>"),
        }

        let mut sequence = 0;
        if let Some((first, next, last)) = self.sequences {
            sequence = first;
            let _ = write!(
                xml,
                r#"<Header creationTime="{}" sender="mock" instanceId="1" bufferSize="131072" version="1.3" firstSequence="{first}" nextSequence="{next}" lastSequence="{last}"/>"#,
                escape(&self.creation_time)
            );
        }

        xml.push_str("<Streams>");
        for device in &self.devices {
            let _ = write!(
                xml,
                r#"<DeviceStream name="{}" uuid="{}"><ComponentStream component="Device" name="main" componentId="main">"#,
                escape(&device.name),
                escape(&device.uuid)
            );
            for category in ["Samples", "Events", "Condition"] {
                let items: Vec<&Item> = device.items.iter().filter(|i| i.category == category).collect();
                if items.is_empty() {
                    continue;
                }
                let _ = write!(xml, "<{category}>");
                for item in items {
                    let _ = write!(
                        xml,
                        r#"<{tag} dataItemId="{id}" timestamp="{ts}" sequence="{sequence}""#,
                        tag = item.tag,
                        id = escape(&item.data_item_id),
                        ts = escape(&item.timestamp),
                    );
                    sequence += 1;
                    match &item.value {
                        Some(value) => {
                            let _ = write!(xml, ">{}</{}>", escape(value), item.tag);
                        }
                        None => xml.push_str("/>"),
                    }
                }
                let _ = write!(xml, "</{category}>");
            }
            xml.push_str("</ComponentStream></DeviceStream>");
        }
        xml.push_str("</Streams></MTConnectStreams>");
        xml
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{read_header, Namespace};

    #[test]
    fn test_rendered_document_has_readable_header() {
        let xml = StreamsDocument::new(1, 10, 9)
            .device("mill-1", |d| d.sample("Load", "2024-05-01T12:00:00Z", "3.5"))
            .render();
        let header = read_header(&RawPayload::new(xml), &Namespace::new(STREAMS_NAMESPACE)).unwrap();

        assert_eq!((header.first, header.next, header.last), (1, 10, 9));
    }

    #[tokio::test]
    async fn test_script_exhaustion_is_unreachable() {
        let agent = ScriptedAgent::new();
        agent.push_sample("<a/>");

        assert!(agent.sample(&StreamWindow::new(1, 2)).await.is_ok());
        assert!(agent.sample(&StreamWindow::new(2, 3)).await.is_err());
        assert_eq!(agent.sample_requests(), vec!["sample?from=1&to=2", "sample?from=2&to=3"]);
    }

    #[tokio::test]
    async fn test_stop_fires_after_configured_samples() {
        let agent = ScriptedAgent::new();
        let stop = StopSignal::new();
        agent.repeat_sample("<a/>");
        agent.stop_after_samples(2, stop.clone());

        agent.sample(&StreamWindow::new(1, 2)).await.unwrap();
        assert!(!stop.is_stopped());
        agent.sample(&StreamWindow::new(2, 3)).await.unwrap();
        assert!(stop.is_stopped());
    }
}
