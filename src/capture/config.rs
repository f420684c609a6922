//! Capture session configuration.
//!
//! The capture section describes what the (mock) pipeline produces; the
//! sink section describes where frames end up on disk.

use super::stream::PixelFormat;
use crate::sink::SinkConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index or identifier.
    pub device_id: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format shared by all streams.
    pub pixel_format: PixelFormat,
    /// Number of streams to configure.
    pub streams: u32,
    /// Buffers allocated per stream.
    pub buffer_count: u32,
    /// Fixed exposure time in microseconds.
    pub exposure_us: u32,
    /// Fixed gain value (camera-specific units).
    pub gain: u32,
    /// Target frames per second.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Nv12,
            streams: 1,
            buffer_count: 4,
            exposure_us: 10000, // 10ms
            gain: 1,
            fps: 30,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Human-readable camera identity, used in stream names and DNG tags.
    pub fn camera_id(&self) -> String {
        format!("cam{}", self.device_id)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.streams == 0 || self.streams > 8 {
            return Err(ConfigError::InvalidStreamCount(self.streams));
        }
        if self.buffer_count == 0 {
            return Err(ConfigError::InvalidBufferCount);
        }
        if self.exposure_us == 0 {
            return Err(ConfigError::InvalidExposure);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid stream count {0} (must be 1-8)")]
    InvalidStreamCount(u32),
    #[error("at least one buffer per stream is required")]
    InvalidBufferCount,
    #[error("invalid exposure time")]
    InvalidExposure,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[capture]` section.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[sink]` section.
    #[serde(default)]
    pub sink: SinkConfig,
    /// `[output]` section.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Run continuously (true) or process fixed number of frames (false).
    pub continuous: bool,
    /// Number of requests to process if not continuous.
    pub frame_count: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            frame_count: 10,
            metrics_port: 0,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_zero_streams_invalid() {
        let mut config = CaptureConfig::default();
        config.streams = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStreamCount(0))
        ));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            width = 320
            pixel_format = "xy10"

            [sink]
            pattern = "out/#.raw"
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.height, 480);
        assert_eq!(config.capture.pixel_format, PixelFormat::Xy10);
        assert_eq!(config.sink.pattern, "out/#.raw");
        assert_eq!(config.output.frame_count, 10);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let result = FileConfig::from_toml("[capture]\nfps = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidFrameRate)));

        let result = FileConfig::from_toml("[capture\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
