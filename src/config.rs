use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Which camera backend the live session acquires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Generated test pattern. Always available.
    #[default]
    Synthetic,
    /// Direct V4L2 capture (requires the `v4l2` feature on Linux).
    V4l2,
}

/// Settings for one live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket endpoint of the recognizer.
    pub endpoint: String,
    /// Sampling cadence. Independent of network latency.
    pub sample_interval_ms: u64,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// Frames the link may hold while a send is in flight. Anything beyond is dropped.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            outbound_capacity: 1,
        }
    }
}

impl SessionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid("sample_interval_ms must be greater than zero".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Invalid("outbound_capacity must be at least 1".into()));
        }
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be a ws:// or wss:// url, got {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

/// Camera selection and the synthetic pattern's geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// V4L2 device index (`/dev/videoN`).
    pub device_index: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::default(),
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

/// Top-level client configuration, as stored in a JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub session: SessionConfig,
    pub camera: CameraConfig,
    /// HTTP origin of the recognizer, used by the upload flow.
    pub origin: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            camera: CameraConfig::default(),
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&raw)?;
        config.session.validate()?;
        Ok(config)
    }
}
