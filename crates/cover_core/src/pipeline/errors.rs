//! Error types for the pipeline.
//!
//! Errors chain through layers: Run → Step → Transport/Poll → Detail.

use thiserror::Error;

use super::types::PipelineState;
use crate::client::TransportError;
use crate::poller::PollError;

/// Top-level pipeline error with run context.
///
/// Failed and cancelled runs carry the state reached so far. It is never
/// presented as a finished result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Run '{run_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
        state: Box<PipelineState>,
    },

    #[error("Run '{run_name}' was cancelled")]
    Cancelled {
        run_name: String,
        /// Step that was running or about to run.
        step_name: Option<String>,
        state: Box<PipelineState>,
    },

    #[error("Run '{run_name}' has no steps")]
    Empty { run_name: String },
}

impl PipelineError {
    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
        state: PipelineState,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
            state: Box::new(state),
        }
    }

    pub fn cancelled(
        run_name: impl Into<String>,
        step_name: Option<&str>,
        state: PipelineState,
    ) -> Self {
        Self::Cancelled {
            run_name: run_name.into(),
            step_name: step_name.map(str::to_string),
            state: Box::new(state),
        }
    }

    pub fn empty(run_name: impl Into<String>) -> Self {
        Self::Empty {
            run_name: run_name.into(),
        }
    }

    /// Steps recorded before the run stopped.
    pub fn partial_state(&self) -> Option<&PipelineState> {
        match self {
            Self::StepFailed { state, .. } | Self::Cancelled { state, .. } => Some(state),
            Self::Empty { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Error from a pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// The backend has not produced the artifact yet.
    #[error("{what} is not ready yet ({detail})")]
    NotReady { what: String, detail: String },

    /// The backend reported the job as failed.
    #[error("{what} failed on the backend: {reason}")]
    JobFailed { what: String, reason: String },

    /// A completed job is missing an expected artifact slot.
    #[error("{what} completed without a '{slot}' artifact")]
    MissingArtifact { what: String, slot: String },

    #[error("Request for {operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_ready(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NotReady {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn job_failed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JobFailed {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_artifact(what: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::MissingArtifact {
            what: what.into(),
            slot: slot.into(),
        }
    }

    pub fn transport(operation: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            operation: operation.into(),
            source,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;
