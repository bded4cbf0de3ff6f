//! Render, encoder and logging configuration.
//!
//! All sections deserialize with defaults, so an empty JSON object is a
//! valid configuration file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MixdownError, Result};

/// Output sample rate of every render pass (Hz)
pub const SAMPLE_RATE: u32 = 44100;

/// Output channel count of every render pass
pub const NUM_CHANNELS: usize = 2;

/// Samples per channel handed to the MP3 codec at a time
pub const MP3_BLOCK_SIZE: usize = 1152;

/// Default MP3 bitrate in kbps
pub const DEFAULT_MP3_BITRATE: u32 = 160;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MixdownConfig {
    /// Offline render settings
    pub render: RenderConfig,

    /// MP3 encoder settings
    pub mp3: Mp3Config,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl MixdownConfig {
    /// Load a configuration file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: MixdownConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every section is usable
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        self.mp3.validate()
    }
}

/// Offline render parameters
///
/// The WAV layout is fixed at 44.1kHz stereo, so these are checked rather
/// than freely chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sample rate of the rendering context
    pub sample_rate: u32,

    /// Channel count of the rendering context
    pub channels: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: NUM_CHANNELS,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(MixdownError::Config {
                reason: format!(
                    "sample rate {} is not supported (only {})",
                    self.sample_rate, SAMPLE_RATE
                ),
            });
        }
        if self.channels != NUM_CHANNELS {
            return Err(MixdownError::Config {
                reason: format!(
                    "{} channels are not supported (only stereo)",
                    self.channels
                ),
            });
        }
        Ok(())
    }
}

/// MP3 encoder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mp3Config {
    /// Constant bitrate in kbps
    pub bitrate_kbps: u32,

    /// Samples per channel per encoder call
    pub block_size: usize,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self {
            bitrate_kbps: DEFAULT_MP3_BITRATE,
            block_size: MP3_BLOCK_SIZE,
        }
    }
}

impl Mp3Config {
    /// Create a config for the given bitrate with the standard block size
    pub fn with_bitrate(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(MixdownError::Config {
                reason: "mp3 block size must be positive".to_string(),
            });
        }
        if !(96..=320).contains(&self.bitrate_kbps) {
            return Err(MixdownError::Config {
                reason: format!("mp3 bitrate {}kbps is out of range", self.bitrate_kbps),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "mixdown=debug,warn")
    pub level: String,

    /// Whether to output structured JSON logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MixdownConfig::default();
        assert_eq!(config.render.sample_rate, 44100);
        assert_eq!(config.render.channels, 2);
        assert_eq!(config.mp3.bitrate_kbps, 160);
        assert_eq!(config.mp3.block_size, 1152);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mp3": {{ "bitrate_kbps": 192 }} }}"#).unwrap();

        let config = MixdownConfig::load(file.path()).unwrap();
        assert_eq!(config.mp3.bitrate_kbps, 192);
        assert_eq!(config.mp3.block_size, 1152);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_unsupported_sample_rate() {
        let config = RenderConfig {
            sample_rate: 48000,
            channels: 2,
        };
        assert!(matches!(
            config.validate(),
            Err(MixdownError::Config { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_block_size() {
        let config = Mp3Config {
            bitrate_kbps: 160,
            block_size: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bitrate_range() {
        assert!(Mp3Config::with_bitrate(96).validate().is_ok());
        assert!(Mp3Config::with_bitrate(320).validate().is_ok());
        assert!(Mp3Config::with_bitrate(64).validate().is_err());
        assert!(Mp3Config::with_bitrate(384).validate().is_err());
    }
}
