use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use super::payload::RawPayload;
use super::table::parse_timestamp;
use crate::error::{CaptureError, CaptureResult};

pub const HEADER_ELEMENT: &str = "Header";

/// XML namespace of the agent's response documents.
///
/// Discovered once from the root element of the first payload and used to
/// qualify every later element lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace(Option<String>);

impl Namespace {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(Some(uri.into()))
    }

    /// Documents whose elements carry no namespace
    pub fn none() -> Self {
        Self(None)
    }

    pub fn discover(doc: &Document<'_>) -> Self {
        Self(doc.root_element().tag_name().namespace().map(str::to_owned))
    }

    pub fn uri(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// True if `node` is an element named `local` in this namespace
    pub fn matches(&self, node: Node<'_, '_>, local: &str) -> bool {
        node.is_element()
            && node.tag_name().name() == local
            && node.tag_name().namespace() == self.uri()
    }

    /// First descendant element of `node` named `local`
    pub fn find<'a, 'input>(&self, node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
        node.descendants().find(|n| self.matches(*n, local))
    }
}

/// Stream metadata carried by every `current` and `sample` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub creation_time: DateTime<Utc>,
    pub first: u64,
    pub next: u64,
    pub last: u64,
}

/// Read the header of a payload.
///
/// An unparseable document is reported as `HeaderMissing`: agents under load
/// hand back truncated or error documents that succeed on a later request.
pub fn read_header(payload: &RawPayload, ns: &Namespace) -> CaptureResult<StreamHeader> {
    let doc = payload
        .parse()
        .map_err(|e| CaptureError::header_missing(format!("payload is not a document: {e}")))?;
    header_from_document(&doc, ns)
}

pub fn header_from_document(doc: &Document<'_>, ns: &Namespace) -> CaptureResult<StreamHeader> {
    let header = ns
        .find(doc.root(), HEADER_ELEMENT)
        .ok_or_else(|| CaptureError::header_missing("no Header element in response"))?;

    let creation_time = attribute(header, "creationTime")
        .and_then(|raw| parse_timestamp(raw).ok_or_else(|| invalid("creationTime", raw)))?;

    Ok(StreamHeader {
        creation_time,
        first: sequence(header, "firstSequence")?,
        next: sequence(header, "nextSequence")?,
        last: sequence(header, "lastSequence")?,
    })
}

fn attribute<'a>(header: Node<'a, '_>, name: &str) -> CaptureResult<&'a str> {
    header
        .attribute(name)
        .ok_or_else(|| CaptureError::header_missing(format!("Header has no {name} attribute")))
}

fn sequence(header: Node<'_, '_>, name: &str) -> CaptureResult<u64> {
    let raw = attribute(header, name)?;
    raw.trim().parse().map_err(|_| invalid(name, raw))
}

fn invalid(name: &str, raw: &str) -> CaptureError {
    CaptureError::header_missing(format!("Header {name} is not valid: {raw:?}"))
}
