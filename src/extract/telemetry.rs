use roxmltree::{Document, Node};

use super::discovery::device_streams;
use super::DeviceExtractor;
use crate::core::{parse_timestamp, round_to_millis, FieldUpdate, Namespace};
use crate::error::{CaptureError, CaptureResult};

/// Update categories an agent groups observations under
pub const CATEGORIES: [&str; 3] = ["Samples", "Events", "Condition"];

/// Emits one `FieldUpdate` per observation element of a device.
///
/// An element without a usable timestamp makes the whole device's
/// contribution for the window invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryExtractor;

impl TelemetryExtractor {
    pub fn new() -> Self {
        Self
    }

    fn field_update(&self, element: Node<'_, '_>, device_id: &str) -> CaptureResult<FieldUpdate> {
        let tag = element.tag_name().name();
        let raw = element
            .attribute("timestamp")
            .ok_or_else(|| CaptureError::extraction(device_id, format!("{tag} has no timestamp")))?;
        let timestamp = parse_timestamp(raw).ok_or_else(|| {
            CaptureError::extraction(device_id, format!("{tag} has invalid timestamp {raw:?}"))
        })?;

        Ok(FieldUpdate {
            timestamp: round_to_millis(timestamp),
            device_id: device_id.to_string(),
            field_tag: tag.to_string(),
            value: element.text().map(str::to_string),
        })
    }
}

impl DeviceExtractor for TelemetryExtractor {
    type Output = Vec<FieldUpdate>;

    fn extract(&self, doc: &Document<'_>, device_id: &str, ns: &Namespace) -> CaptureResult<Self::Output> {
        let mut updates = Vec::new();

        for stream in device_streams(doc, ns, device_id) {
            let categories = stream
                .descendants()
                .filter(|n| CATEGORIES.iter().any(|category| ns.matches(*n, category)));

            for category in categories {
                for element in category.children().filter(Node::is_element) {
                    updates.push(self.field_update(element, device_id)?);
                }
            }
        }

        Ok(updates)
    }

    fn count(output: &Self::Output) -> usize {
        output.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::{StreamsDocument, STREAMS_NAMESPACE};
    use crate::core::RawPayload;

    fn extract(xml: String, device: &str) -> CaptureResult<Vec<FieldUpdate>> {
        TelemetryExtractor::new().extract_payload(&RawPayload::new(xml), device, &Namespace::new(STREAMS_NAMESPACE))
    }

    #[test]
    fn test_extracts_all_three_categories() {
        let xml = StreamsDocument::new(1, 4, 3)
            .device("mill-1", |d| {
                d.sample("Load", "2024-05-01T12:00:00.0004Z", "12.5")
                    .event("Execution", "2024-05-01T12:00:01Z", Some("ACTIVE"))
                    .condition("Normal", "2024-05-01T12:00:02Z", None)
            })
            .render();
        let updates = extract(xml, "mill-1").unwrap();

        let tags: Vec<&str> = updates.iter().map(|u| u.field_tag.as_str()).collect();
        assert_eq!(tags, vec!["Load", "Execution", "Normal"]);
        assert_eq!(updates[0].value.as_deref(), Some("12.5"));
        assert_eq!(updates[0].timestamp.timestamp_subsec_nanos(), 0);
        assert_eq!(updates[2].value, None);
        assert!(updates.iter().all(|u| u.device_id == "mill-1"));
    }

    #[test]
    fn test_only_requested_device_is_read() {
        let xml = StreamsDocument::new(1, 3, 2)
            .device("mill-1", |d| d.sample("Load", "2024-05-01T12:00:00Z", "1"))
            .device("lathe-2", |d| d.sample("Speed", "2024-05-01T12:00:00Z", "2"))
            .render();
        let updates = extract(xml, "lathe-2").unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].field_tag, "Speed");
    }

    #[test]
    fn test_absent_device_contributes_nothing() {
        let xml = StreamsDocument::new(1, 1, 0).device("mill-1", |d| d).render();
        assert!(extract(xml, "ghost").unwrap().is_empty());
    }

    #[test]
    fn test_bad_timestamp_fails_the_device() {
        let xml = StreamsDocument::new(1, 3, 2)
            .device("mill-1", |d| {
                d.sample("Load", "2024-05-01T12:00:00Z", "1")
                    .sample("Speed", "not-a-time", "2")
            })
            .render();
        let err = extract(xml, "mill-1").unwrap_err();

        assert!(matches!(err, CaptureError::Extraction { ref device, .. } if device == "mill-1"));
    }

    #[test]
    fn test_unavailable_is_kept_as_text() {
        let xml = StreamsDocument::new(1, 2, 1)
            .device("mill-1", |d| d.event("Mode", "2024-05-01T12:00:00Z", Some("UNAVAILABLE")))
            .render();
        let updates = extract(xml, "mill-1").unwrap();

        assert_eq!(updates[0].value.as_deref(), Some("UNAVAILABLE"));
    }
}
