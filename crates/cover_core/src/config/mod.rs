//! Configuration management.
//!
//! - TOML file with one table per concern
//! - Atomic writes (temp file, then rename)
//! - Section-level updates that leave other tables untouched
//!
//! # Example
//!
//! ```no_run
//! use cover_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/cover-studio.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().identity.user_id = "111".to_string();
//! config.update_section(ConfigSection::Identity).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BackendSettings, ConfigSection, IdentitySettings, LoggingSettings, PathSettings,
    PollingSettings, Settings,
};
