use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::info;

use super::naming::audio_file_name;
use crate::core::AudioChannel;

pub const WAV_BITS_PER_SAMPLE: u16 = 16;

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: WAV_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write one channel as a mono 16-bit PCM file under `dir`
pub fn write_channel(dir: &Path, channel: &AudioChannel, sample_rate: u32) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create audio directory {}", dir.display()))?;

    let path = dir.join(audio_file_name(&channel.device_id, &channel.start_time));
    let mut writer = hound::WavWriter::create(&path, spec(sample_rate))
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for &sample in &channel.samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {}", path.display()))?;

    info!(device = %channel.device_id, path = %path.display(), samples = channel.len(), "wrote WAV");
    Ok(path)
}

/// Write every channel, one blocking task per file. All files are attempted
/// even when one fails; the first failure is returned.
pub async fn write_channels(dir: &Path, channels: Vec<AudioChannel>, sample_rate: u32) -> Result<Vec<PathBuf>> {
    let mut writers = JoinSet::new();
    for (index, channel) in channels.into_iter().enumerate() {
        let dir = dir.to_path_buf();
        writers.spawn_blocking(move || (index, write_channel(&dir, &channel, sample_rate)));
    }

    let mut written = Vec::new();
    let mut first_error = None;
    while let Some(joined) = writers.join_next().await {
        match joined.context("WAV writer task panicked") {
            Ok((index, Ok(path))) => written.push((index, path)),
            Ok((_, Err(e))) | Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    written.sort_by_key(|(index, _)| *index);
    Ok(written.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn channel(device: &str, samples: &[i16]) -> AudioChannel {
        let mut channel = AudioChannel::new(device, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        channel.append(samples);
        channel
    }

    #[test]
    fn test_wav_is_mono_16_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_channel(dir.path(), &channel("mic-01", &[0, 1, -1, i16::MAX, i16::MIN]), 48_000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 1, -1, i16::MAX, i16::MIN]);
    }

    #[tokio::test]
    async fn test_write_channels_keeps_device_order() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![channel("mic-a", &[1, 2]), channel("mic-b", &[3])];

        let paths = write_channels(dir.path(), channels, 48_000).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].to_string_lossy().contains("mic-a."));
        assert!(paths[1].to_string_lossy().contains("mic-b."));
    }
}
