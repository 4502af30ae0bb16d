use roxmltree::Document;

use super::DeviceExtractor;
use crate::core::Namespace;
use crate::error::CaptureResult;

pub const TIME_SERIES_ELEMENT: &str = "DisplacementTimeSeries";

/// Collects a channel's time-series samples from one window.
///
/// The channel's data item is the last `-`-separated segment of the device
/// uuid, so `mic-a1` reads `DisplacementTimeSeries[@dataItemId="a1"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioExtractor;

impl AudioExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn data_item_id(device_id: &str) -> &str {
        device_id.rsplit('-').next().unwrap_or(device_id)
    }
}

impl DeviceExtractor for AudioExtractor {
    type Output = Vec<i16>;

    fn extract(&self, doc: &Document<'_>, device_id: &str, ns: &Namespace) -> CaptureResult<Self::Output> {
        let item_id = Self::data_item_id(device_id);
        let mut samples = Vec::new();

        let series = doc
            .descendants()
            .filter(|n| ns.matches(*n, TIME_SERIES_ELEMENT) && n.attribute("dataItemId") == Some(item_id));
        for element in series {
            if let Some(text) = element.text() {
                samples.extend(parse_samples(text));
            }
        }

        Ok(samples)
    }

    fn count(output: &Self::Output) -> usize {
        output.len()
    }
}

/// Split a time-series body into samples, one per token, so sample indices
/// stay aligned with the channel's fixed rate.
pub fn parse_samples(text: &str) -> Vec<i16> {
    text.split_whitespace().map(parse_sample).collect()
}

/// Integer tokens saturate into `i16`; anything else (`UNAVAILABLE`,
/// decimals, garbage) is zero.
pub fn parse_sample(token: &str) -> i16 {
    let digits = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }

    match token.parse::<i64>() {
        Ok(value) => value.clamp(i16::MIN as i64, i16::MAX as i64) as i16,
        Err(_) if token.starts_with('-') => i16::MIN,
        Err(_) => i16::MAX,
    }
}
