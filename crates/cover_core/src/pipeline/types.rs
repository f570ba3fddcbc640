//! Core types for the pipeline.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::identity::IdentityContext;
use crate::logging::{SessionLogConfig, SessionLogger};
use crate::status::MediaLocator;

/// Progress callback: `(step_name, percent_complete, message)`.
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to every step.
pub struct RunContext {
    pub identity: IdentityContext,
    /// Name used in logs and errors.
    pub run_name: String,
    /// The uploaded file the run is about.
    pub input: String,
    pub logger: SessionLogger,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl RunContext {
    pub fn new(identity: IdentityContext, input: impl Into<String>) -> Self {
        let input = input.into();
        let run_name = format!("convert {}", input);
        Self {
            identity,
            logger: SessionLogger::new(run_name.clone(), SessionLogConfig::default(), None),
            run_name,
            input,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    /// Rename the run. A default logger is renamed with it; one set with
    /// `with_logger` is kept.
    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        let run_name = run_name.into();
        if self.logger.session_name() == self.run_name {
            self.logger = SessionLogger::new(run_name.clone(), SessionLogConfig::default(), None);
        }
        self.run_name = run_name;
        self
    }

    pub fn with_logger(mut self, logger: SessionLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Cancelling `token` cancels the run.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// One step's entry in the run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_name: String,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<MediaLocator>,
}

/// Ordered record of a run's steps.
///
/// Steps are appended in execution order; a succeeded record is never
/// rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub started_at: Option<String>,
    records: Vec<StepRecord>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn record(&self, step_name: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.step_name == step_name)
    }

    /// Locator produced by a succeeded step.
    pub fn locator(&self, step_name: &str) -> Option<&MediaLocator> {
        self.record(step_name)
            .filter(|r| r.outcome == StepOutcome::Succeeded)
            .and_then(|r| r.locator.as_ref())
    }

    /// Locators of all succeeded steps, in order.
    pub fn locators(&self) -> impl Iterator<Item = (&str, &MediaLocator)> {
        self.records.iter().filter_map(|r| match (&r.outcome, &r.locator) {
            (StepOutcome::Succeeded, Some(locator)) => Some((r.step_name.as_str(), locator)),
            _ => None,
        })
    }

    pub fn succeeded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Succeeded)
            .count()
    }

    pub(crate) fn begin(&mut self, step_name: &str) {
        self.records.push(StepRecord {
            step_name: step_name.to_string(),
            outcome: StepOutcome::Pending,
            locator: None,
        });
    }

    pub(crate) fn succeed(&mut self, locator: MediaLocator) {
        if let Some(record) = self.current_mut() {
            record.outcome = StepOutcome::Succeeded;
            record.locator = Some(locator);
        }
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        if let Some(record) = self.current_mut() {
            record.outcome = StepOutcome::Failed(reason.into());
        }
    }

    fn current_mut(&mut self) -> Option<&mut StepRecord> {
        self.records
            .last_mut()
            .filter(|r| r.outcome == StepOutcome::Pending)
    }
}

/// Result of a completed run: the final locator plus every intermediate.
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    pub locator: MediaLocator,
    pub state: PipelineState,
}
