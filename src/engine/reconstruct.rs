use tracing::warn;

use crate::core::{AudioBuffers, AudioChannel, DenseRow, DenseTable, SparseTable};

/// Turn the merged sparse table into a dense one.
///
/// Rows are stable-sorted by timestamp (ties keep arrival order), then each
/// unset cell takes the value of the same column in the row above. A column
/// first observed at row `i` stays unset in rows before `i`.
pub fn densify(table: SparseTable) -> DenseTable {
    let (columns, mut timestamps, mut cells) = table.take_rows();
    timestamps.sort_by_key(|ts| *ts);

    let rows = timestamps
        .into_iter()
        .map(|timestamp| {
            let mut observed = cells.remove(&timestamp).unwrap_or_default();
            DenseRow {
                timestamp,
                cells: columns.iter().map(|column| observed.remove(column)).collect(),
            }
        })
        .collect();

    let mut dense = DenseTable::new(columns, rows);
    dense.forward_fill();
    dense
}

/// Sample buffer of one channel. No gap filling: a window whose extraction
/// failed simply contributes fewer samples.
pub fn finalize(channel: AudioChannel) -> Vec<i16> {
    channel.samples
}

/// Channels ready to persist, in device order. Length differences between
/// channels are reported, not padded.
pub fn finalize_all(buffers: AudioBuffers) -> Vec<AudioChannel> {
    let channels = buffers.into_channels();

    let longest = channels.iter().map(AudioChannel::len).max().unwrap_or(0);
    for channel in channels.iter().filter(|c| c.len() < longest) {
        warn!(
            device = %channel.device_id,
            samples = channel.len(),
            longest,
            "channel is shorter than its siblings"
        );
    }

    channels
}
