use std::sync::Arc;

/// Body of one agent response.
///
/// Cloning shares the underlying text; the payload is never mutated after
/// the fetch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    text: Arc<str>,
}

impl RawPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }

    /// Build from raw response bytes, replacing invalid UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Parse the payload as an XML document borrowing from it
    pub fn parse(&self) -> Result<roxmltree::Document<'_>, roxmltree::Error> {
        roxmltree::Document::parse(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_text() {
        let payload = RawPayload::new("<MTConnectStreams/>");
        let copy = payload.clone();

        assert!(std::ptr::eq(payload.as_str(), copy.as_str()));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let payload = RawPayload::from_bytes(&[b'<', 0xff, b'>']);
        assert_eq!(payload.len(), "<\u{fffd}>".len());
        assert!(payload.parse().is_err());
    }
}
