use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::core::{ColumnNaming, StartPosition};
use crate::engine::CaptureSettings;
use crate::resilience::RetryPolicy;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "MTCAPTURE_CONFIG";

/// Settings shared by the capture binaries.
///
/// Every field has a compiled-in default; a JSON file only needs the keys it
/// wants to override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Agent base URL; request paths are appended to it
    pub agent_url: String,

    /// WAV sample rate in Hz
    pub sample_rate: u32,

    /// Directory the CSV log is written to
    pub output_dir: PathBuf,

    /// Directory WAV files are written to
    pub audio_dir: PathBuf,

    pub csv_file_name: String,

    /// Steady-state header retry
    pub header_retry: RetryPolicy,

    /// Concurrent extraction workers per window
    pub max_workers: usize,

    pub telemetry_start: StartPosition,
    pub audio_start: StartPosition,
    pub column_naming: ColumnNaming,

    /// Batch mode only: keep rows stamped before the session started
    pub keep_history: bool,

    pub connect_timeout_ms: u64,

    /// Pause between fetches once the agent has nothing new
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            agent_url: "http://localhost:5000/".to_string(),
            sample_rate: 48_000,
            output_dir: PathBuf::from("."),
            audio_dir: PathBuf::from("./audio"),
            csv_file_name: "output.csv".to_string(),
            header_retry: RetryPolicy::default(),
            max_workers: 8,
            telemetry_start: StartPosition::Beginning,
            audio_start: StartPosition::Latest,
            column_naming: ColumnNaming::Qualified,
            keep_history: false,
            connect_timeout_ms: 5_000,
            poll_interval_ms: 200,
        }
    }
}

impl CaptureConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: CaptureConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Defaults, overridden by the file named in `MTCAPTURE_CONFIG` if set
    pub async fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)).await,
            None => Ok(Self::default()),
        }
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.csv_file_name)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Engine settings for a capture starting at `start`
    pub fn settings(&self, start: StartPosition) -> CaptureSettings {
        CaptureSettings {
            retry: self.header_retry,
            max_workers: self.max_workers,
            start,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_agent_conventions() {
        let config = CaptureConfig::default();

        assert_eq!(config.agent_url, "http://localhost:5000/");
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.header_retry.max_attempts, 100);
        assert_eq!(config.header_retry.delay(), Duration::from_secs(1));
        assert_eq!(config.csv_path(), PathBuf::from("./output.csv"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "agent_url": "http://cell-7:5000/", "column_naming": "bare", "audio_start": "beginning" }"#;
        let config: CaptureConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.agent_url, "http://cell-7:5000/");
        assert_eq!(config.column_naming, ColumnNaming::Bare);
        assert_eq!(config.audio_start, StartPosition::Beginning);
        assert_eq!(config.max_workers, 8);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        std::fs::write(&path, r#"{ "keep_history": true, "max_workers": 2, "poll_interval_ms": 50 }"#).unwrap();

        let config = CaptureConfig::load(&path).await.unwrap();
        assert!(config.keep_history);
        let settings = config.settings(StartPosition::Latest);
        assert_eq!(settings.max_workers, 2);
        assert_eq!(settings.poll_interval(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CaptureConfig::load(&dir.path().join("absent.json")).await;

        assert!(result.is_err());
    }
}
