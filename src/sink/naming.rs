use chrono::SecondsFormat;

use crate::core::Timestamp;

/// Timestamp as written into the CSV log
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{device}.{start}.wav`, with `:` swapped for `_` so the name is valid on
/// every filesystem the files end up on.
pub fn audio_file_name(device_id: &str, start_time: &Timestamp) -> String {
    let start = start_time.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string();
    format!("{device_id}.{start}.wav").replace(':', "_")
}
