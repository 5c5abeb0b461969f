//! Settings for loading the library, polling and block acquisitions.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. The block defaults are the classic demo setup: 1 MHz,
//! 10 kS, 8 V DC on every channel, rising edge trigger on channel 0.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{Coupling, MeasureMode, TriggerKind};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub loader: LoaderSettings,
    pub poll: PollSettings,
    pub block: BlockConfig,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Directory that bundled library paths are relative to. Defaults to
    /// the directory of the running executable.
    pub base_dir: Option<PathBuf>,
    /// Skip the platform lookup and load exactly this file.
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub backoff: u32,
    pub max_interval_ms: u64,
    pub timeout_ms: Option<u64>,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            backoff: 1,
            max_interval_ms: 10,
            timeout_ms: None,
        }
    }
}

/// Requested block measurement setup. The SDK may coerce any of these.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub measure_mode: MeasureMode,
    /// Hz
    pub sample_frequency: f64,
    pub record_length: u64,
    /// 0.0 ..= 1.0
    pub pre_sample_ratio: f64,
    /// Seconds
    pub trigger_timeout: f64,
    /// Applied to every channel of the scope.
    pub channel: ChannelConfig,
    pub trigger: TriggerConfig,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            measure_mode: MeasureMode::Block,
            sample_frequency: 1e6,
            record_length: 10_000,
            pre_sample_ratio: 0.0,
            trigger_timeout: 100e-3,
            channel: ChannelConfig::default(),
            trigger: TriggerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// Volts
    pub range: f64,
    pub coupling: Coupling,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            range: 8.0,
            coupling: Coupling::Dcv,
        }
    }
}

/// Trigger on a single channel; all other channel triggers are disabled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub channel: u16,
    pub kind: TriggerKind,
    /// Fraction of the channel range
    pub level: f64,
    /// Fraction of the channel range
    pub hysteresis: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            kind: TriggerKind::RisingEdge,
            level: 0.5,
            hysteresis: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll.interval(), Duration::from_millis(10));
        assert_eq!(settings.block.record_length, 10_000);
        assert_eq!(settings.block.trigger.kind, TriggerKind::RisingEdge);
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml_str(
            r#"
            [poll]
            interval_ms = 5
            timeout_ms = 2000

            [block]
            record_length = 2500
            channel.coupling = "acv"
            trigger.kind = "falling_edge"
            trigger.channel = 1
            "#,
        )
        .unwrap();

        assert_eq!(settings.poll.interval(), Duration::from_millis(5));
        assert_eq!(settings.poll.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(settings.block.record_length, 2500);
        assert!((settings.block.sample_frequency - 1e6).abs() < f64::EPSILON);
        assert_eq!(settings.block.channel.coupling, Coupling::Acv);
        assert!(settings.block.channel.enabled);
        assert_eq!(settings.block.trigger.kind, TriggerKind::FallingEdge);
        assert_eq!(settings.block.trigger.channel, 1);
    }

    #[test]
    fn test_rejects_unknown_coupling() {
        let result = Settings::from_toml_str("[block.channel]\ncoupling = \"dc\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Settings::from_file(Path::new("/nonexistent/libtiepie.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
