//! Logging types.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Session logger behaviour.
#[derive(Debug, Clone)]
pub struct SessionLogConfig {
    pub level: LogLevel,
    /// Only report progress when it crosses a multiple of this step.
    pub progress_step: u32,
    /// Lines kept for `show_tail`.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            progress_step: 20,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

impl SessionLogConfig {
    pub fn from_settings(settings: &crate::config::LoggingSettings) -> Self {
        Self {
            level: settings.level,
            error_tail: settings.error_tail as usize,
            ..Self::default()
        }
    }
}

/// Receives every formatted line; the view layer's log pane.
pub type ViewLogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// `=== Phase ===`
    Phase,
    /// `--- Step ---`
    Step,
    /// `-> GET /path`
    Request,
    /// `[STATUS] ...`
    Status,
    Success,
    Warning,
    Error,
    None,
}

impl MessagePrefix {
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Step => format!("--- {} ---", message),
            MessagePrefix::Request => format!("-> {}", message),
            MessagePrefix::Status => format!("[STATUS] {}", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
            MessagePrefix::None => message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
    }

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Phase.format("Upload"), "=== Upload ===");
        assert_eq!(MessagePrefix::Status.format("Pending"), "[STATUS] Pending");
        assert_eq!(MessagePrefix::None.format("plain"), "plain");
    }
}
