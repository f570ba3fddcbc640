//! Per-session logger with tracing and view callback output.
//!
//! One logger per user-visible run (a separation watch, a training
//! submission, a conversion pipeline). Lines go to `tracing` and, when a
//! view is attached, to its callback. Recent lines are kept in a tail
//! buffer for error reports.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogLevel, MessagePrefix, SessionLogConfig, ViewLogCallback};
use crate::status::JobStatus;

/// Logger for a single run. Clones share buffers and callback.
#[derive(Clone)]
pub struct SessionLogger {
    session_name: Arc<str>,
    config: SessionLogConfig,
    view_callback: Arc<Mutex<Option<ViewLogCallback>>>,
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
    last_progress: Arc<Mutex<Option<u32>>>,
}

impl SessionLogger {
    pub fn new(
        session_name: impl Into<String>,
        config: SessionLogConfig,
        view_callback: Option<ViewLogCallback>,
    ) -> Self {
        let capacity = config.error_tail;
        Self {
            session_name: Arc::from(session_name.into()),
            config,
            view_callback: Arc::new(Mutex::new(view_callback)),
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            last_progress: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Replace (or detach) the view callback.
    pub fn set_view_callback(&self, callback: Option<ViewLogCallback>) {
        *self.view_callback.lock() = callback;
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        match level {
            LogLevel::Trace => tracing::trace!(session = %self.session_name, "{}", message),
            LogLevel::Debug => tracing::debug!(session = %self.session_name, "{}", message),
            LogLevel::Info => tracing::info!(session = %self.session_name, "{}", message),
            LogLevel::Warn => tracing::warn!(session = %self.session_name, "{}", message),
            LogLevel::Error => tracing::error!(session = %self.session_name, "{}", message),
        }

        let formatted = self.format_message(message);
        self.push_tail(&formatted);
        if let Some(callback) = self.view_callback.lock().as_ref() {
            callback(&formatted);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn step(&self, step_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Step.format(step_name));
    }

    pub fn request(&self, description: &str) {
        self.log(LogLevel::Debug, &MessagePrefix::Request.format(description));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a status observation from a poll or a manual check.
    pub fn status(&self, status: &JobStatus) {
        let level = match status {
            JobStatus::Failed { .. } => LogLevel::Warn,
            _ => LogLevel::Info,
        };
        self.log(level, &MessagePrefix::Status.format(&status.to_string()));
    }

    /// Log progress, skipping values within the same step bucket.
    ///
    /// Returns true if the progress was logged.
    pub fn progress(&self, percent: u32) -> bool {
        let step = self.config.progress_step.max(1);
        {
            let mut last = self.last_progress.lock();
            if let Some(previous) = *last {
                if percent / step <= previous / step && percent < 100 {
                    return false;
                }
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Replay the tail buffer at error level.
    pub fn show_tail(&self, header: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }

        tracing::error!(session = %self.session_name, "[{}/tail]", header);
        for line in &lines {
            tracing::error!(session = %self.session_name, "{}", line);
        }
        if let Some(callback) = self.view_callback.lock().as_ref() {
            callback(&format!("[{}/tail]", header));
            for line in &lines {
                callback(line);
            }
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    fn push_tail(&self, line: &str) {
        if self.config.error_tail == 0 {
            return;
        }
        let mut buffer = self.tail_buffer.lock();
        if buffer.len() >= self.config.error_tail {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
        } else {
            message.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> SessionLogConfig {
        SessionLogConfig {
            show_timestamps: false,
            error_tail: 3,
            ..SessionLogConfig::default()
        }
    }

    #[test]
    fn view_callback_receives_prefixed_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let logger = SessionLogger::new(
            "separate",
            quiet_config(),
            Some(Box::new(move |line: &str| sink.lock().push(line.to_string()))),
        );

        logger.phase("Upload");
        logger.success("queued");

        assert_eq!(
            *lines.lock(),
            vec!["=== Upload ===".to_string(), "[SUCCESS] queued".to_string()]
        );
    }

    #[test]
    fn tail_buffer_keeps_most_recent_lines() {
        let logger = SessionLogger::new("train", quiet_config(), None);
        for i in 0..5 {
            logger.info(&format!("line {}", i));
        }
        assert_eq!(logger.get_tail(), vec!["line 2", "line 3", "line 4"]);

        logger.clear_tail();
        assert!(logger.get_tail().is_empty());
    }

    #[test]
    fn messages_below_level_are_dropped() {
        let logger = SessionLogger::new("convert", quiet_config(), None);
        logger.debug("hidden");
        assert!(logger.get_tail().is_empty());
    }

    #[test]
    fn progress_is_filtered_by_step() {
        let logger = SessionLogger::new("convert", quiet_config(), None);
        assert!(logger.progress(0));
        assert!(!logger.progress(10));
        assert!(logger.progress(25));
        assert!(!logger.progress(30));
        assert!(logger.progress(100));
    }

    #[test]
    fn failed_status_is_logged() {
        let logger = SessionLogger::new("separate", quiet_config(), None);
        logger.status(&JobStatus::failed("out of memory"));
        assert_eq!(logger.get_tail().len(), 1);
        assert!(logger.get_tail()[0].starts_with("[STATUS]"));
    }
}
