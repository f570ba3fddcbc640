//! Settings struct with TOML-based sections.
//!
//! Each section maps to one TOML table and can be rewritten on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::poller::{BackoffPolicy, PollConfig};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Backend connection.
    #[serde(default)]
    pub backend: BackendSettings,

    /// Identity injected into every backend call.
    #[serde(default)]
    pub identity: IdentitySettings,

    /// Poll intervals and transport error policy.
    #[serde(default)]
    pub polling: PollingSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Folders for logs and downloaded artifacts.
    #[serde(default)]
    pub paths: PathSettings,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL every endpoint path is joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Owner and collection for backend calls.
///
/// Both are empty by default; calls fail validation until they are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub artist: String,
}

/// Polling cadence per job kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Separation status interval.
    #[serde(default = "default_separation_interval_ms")]
    pub separation_interval_ms: u64,

    /// Training status interval.
    #[serde(default = "default_training_interval_ms")]
    pub training_interval_ms: u64,

    /// Converted vocal readiness interval.
    #[serde(default = "default_inference_interval_ms")]
    pub inference_interval_ms: u64,

    /// Interval multiplier applied after each non-terminal response.
    /// 1.0 keeps the interval fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the backed-off interval.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Consecutive transport errors tolerated before a poll gives up.
    /// 0 means never give up.
    #[serde(default = "default_max_transport_errors")]
    pub max_transport_errors: u32,
}

fn default_separation_interval_ms() -> u64 {
    30_000
}

fn default_training_interval_ms() -> u64 {
    60_000
}

fn default_inference_interval_ms() -> u64 {
    15_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    300_000
}

fn default_max_transport_errors() -> u32 {
    5
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            separation_interval_ms: default_separation_interval_ms(),
            training_interval_ms: default_training_interval_ms(),
            inference_interval_ms: default_inference_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_transport_errors: default_max_transport_errors(),
        }
    }
}

impl PollingSettings {
    pub fn separation(&self) -> PollConfig {
        self.poll_config(self.separation_interval_ms)
    }

    pub fn training(&self) -> PollConfig {
        self.poll_config(self.training_interval_ms)
    }

    pub fn inference(&self) -> PollConfig {
        self.poll_config(self.inference_interval_ms)
    }

    fn poll_config(&self, interval_ms: u64) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(interval_ms),
            backoff: BackoffPolicy {
                multiplier: self.backoff_multiplier,
                max_interval: Duration::from_millis(self.max_interval_ms),
            },
            max_transport_errors: (self.max_transport_errors > 0)
                .then_some(self.max_transport_errors),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write a daily rolling log file under `paths.logs_folder`.
    #[serde(default)]
    pub file_logging: bool,

    /// Number of recent lines kept for error reports.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file_logging: false,
            error_tail: default_error_tail(),
        }
    }
}

/// Folder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Folder downloaded artifacts are written to.
    #[serde(default = "default_download_folder")]
    pub download_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_download_folder() -> String {
    "downloads".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            logs_folder: default_logs_folder(),
            download_folder: default_download_folder(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Backend,
    Identity,
    Polling,
    Logging,
    Paths,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Backend,
        ConfigSection::Identity,
        ConfigSection::Polling,
        ConfigSection::Logging,
        ConfigSection::Paths,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Backend => "backend",
            ConfigSection::Identity => "identity",
            ConfigSection::Polling => "polling",
            ConfigSection::Logging => "logging",
            ConfigSection::Paths => "paths",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Backend => "# Backend connection",
            ConfigSection::Identity => "# Owner (user_id) and collection (artist) sent with every call",
            ConfigSection::Polling => "# Status polling intervals in milliseconds",
            ConfigSection::Logging => "# Logging configuration",
            ConfigSection::Paths => "# Log and download folders",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[backend]"));
        assert!(toml.contains("[polling]"));
        assert!(toml.contains("separation_interval_ms = 30000"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[identity]\nuser_id = \"111\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.identity.user_id, "111");
        assert_eq!(parsed.identity.artist, "");
        assert_eq!(parsed.polling.separation_interval_ms, 30_000);
        assert_eq!(parsed.backend.timeout_secs, 120);
    }

    #[test]
    fn polling_settings_build_poll_configs() {
        let polling = PollingSettings::default();
        let config = polling.separation();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.backoff.multiplier, 1.0);
        assert_eq!(config.max_transport_errors, Some(5));

        let unlimited = PollingSettings {
            max_transport_errors: 0,
            ..PollingSettings::default()
        };
        assert_eq!(unlimited.training().max_transport_errors, None);
    }

    #[test]
    fn log_level_parses_from_toml() {
        let parsed: Settings = toml::from_str("[logging]\nlevel = \"Debug\"").unwrap();
        assert_eq!(parsed.logging.level, LogLevel::Debug);
    }
}
