use roxmltree::{Document, Node};

use crate::core::header::header_from_document;
use crate::core::{Namespace, RawPayload, StreamHeader};
use crate::error::{CaptureError, CaptureResult};

pub const DEVICE_STREAM_ELEMENT: &str = "DeviceStream";

/// What the start-up `current` request tells us about the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProbe {
    pub namespace: Namespace,
    pub header: StreamHeader,
    /// Known devices, in document order. Fixed for the whole session.
    pub devices: Vec<String>,
}

impl StreamProbe {
    pub fn from_payload(payload: &RawPayload) -> CaptureResult<Self> {
        let doc = payload
            .parse()
            .map_err(|e| CaptureError::header_missing(format!("payload is not a document: {e}")))?;
        let namespace = Namespace::discover(&doc);
        let header = header_from_document(&doc, &namespace)?;
        let devices = discover_devices(&doc, &namespace);

        Ok(Self {
            namespace,
            header,
            devices,
        })
    }
}

/// Identifier of a `DeviceStream`: its uuid, or its name when it has none
pub fn device_id<'a>(stream: Node<'a, '_>) -> Option<&'a str> {
    stream.attribute("uuid").or_else(|| stream.attribute("name"))
}

/// Device identifiers in document order, duplicates removed
pub fn discover_devices(doc: &Document<'_>, ns: &Namespace) -> Vec<String> {
    let mut devices: Vec<String> = Vec::new();
    for stream in doc.descendants().filter(|n| ns.matches(*n, DEVICE_STREAM_ELEMENT)) {
        if let Some(id) = device_id(stream) {
            if !devices.iter().any(|d| d == id) {
                devices.push(id.to_string());
            }
        }
    }
    devices
}

/// Every `DeviceStream` element for `device`, matched on uuid or name
pub fn device_streams<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &'a Namespace,
    device: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants().filter(move |n| {
        ns.matches(*n, DEVICE_STREAM_ELEMENT)
            && (n.attribute("uuid") == Some(device) || n.attribute("name") == Some(device))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::StreamsDocument;

    #[test]
    fn test_probe_reads_namespace_header_and_devices() {
        let xml = StreamsDocument::new(100, 120, 121)
            .device("mill-1", |d| d)
            .device("lathe-2", |d| d)
            .render();
        let probe = StreamProbe::from_payload(&RawPayload::new(xml)).unwrap();

        assert_eq!(probe.namespace.uri(), Some(crate::agent::mock::STREAMS_NAMESPACE));
        assert_eq!(probe.header.next, 120);
        assert_eq!(probe.devices, vec!["mill-1", "lathe-2"]);
    }

    #[test]
    fn test_device_without_uuid_uses_name() {
        let xml = r#"<MTConnectStreams><Header creationTime="2024-05-01T12:00:00Z" firstSequence="1" nextSequence="2" lastSequence="1"/><Streams><DeviceStream name="press"/><DeviceStream name="press"/></Streams></MTConnectStreams>"#;
        let probe = StreamProbe::from_payload(&RawPayload::new(xml)).unwrap();

        assert_eq!(probe.namespace, Namespace::none());
        assert_eq!(probe.devices, vec!["press"]);
    }

    #[test]
    fn test_probe_without_header_fails() {
        let xml = StreamsDocument::new(1, 2, 1).without_header().render();
        let err = StreamProbe::from_payload(&RawPayload::new(xml)).unwrap_err();

        assert!(matches!(err, CaptureError::HeaderMissing { .. }));
    }
}
