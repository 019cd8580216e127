use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub audio: AudioConfig,
    pub backend: BackendConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Device to open when none is named explicitly
    pub default_device: String,
    pub sample_rate: u32,
    /// Telemetry sampling period in milliseconds
    pub telemetry_period_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the transcription/insight pipeline, e.g. "http://localhost:8080"
    pub base_url: String,
    pub max_upload_attempts: u32,
    pub max_poll_attempts: u32,
    pub initial_backoff_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the JSON state file
    pub state_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from `path` if a config file exists there, otherwise use defaults.
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig {
                default_device: "default".to_string(),
                sample_rate: 16000,
                telemetry_period_ms: 100,
            },
            backend: BackendConfig {
                base_url: "http://localhost:8080".to_string(),
                max_upload_attempts: 3,
                max_poll_attempts: 60,
                initial_backoff_ms: 500,
                poll_interval_ms: 2000,
            },
            persistence: PersistenceConfig {
                state_path: "lectern-state.json".to_string(),
            },
        }
    }
}
