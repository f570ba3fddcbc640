//! Pipeline runner that executes steps in sequence.

use tokio_util::sync::CancellationToken;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{FinalArtifact, PipelineState, RunContext};
use crate::status::MediaLocator;

/// Ordered list of steps.
///
/// A step only runs after every earlier step succeeded. The first failure
/// or a cancellation ends the run.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Token that stops the current and future runs of this pipeline.
    ///
    /// Cancelling interrupts the running step; no later step starts.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order.
    ///
    /// For each step: check for cancellation, run `validate_input`, then
    /// `execute` raced against cancellation. Returns the last step's
    /// locator together with the full state.
    pub async fn run(&self, ctx: &RunContext) -> PipelineResult<FinalArtifact> {
        if self.steps.is_empty() {
            return Err(PipelineError::empty(&ctx.run_name));
        }

        let mut state = PipelineState::new();
        let mut last: Option<MediaLocator> = None;
        let total_steps = self.steps.len();

        ctx.logger.phase(&ctx.run_name);

        for (i, step) in self.steps.iter().enumerate() {
            let step_name = step.name();

            if self.is_cancelled() || ctx.is_cancelled() {
                ctx.logger
                    .warn(&format!("Run cancelled before step '{}'", step_name));
                return Err(PipelineError::cancelled(
                    &ctx.run_name,
                    Some(step_name),
                    state,
                ));
            }

            ctx.logger.step(step_name);
            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step.description()));

            state.begin(step_name);

            if let Err(e) = step.validate_input(ctx, &state) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                state.fail(e.to_string());
                return Err(PipelineError::step_failed(&ctx.run_name, step_name, e, state));
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                _ = ctx.cancel_token().cancelled() => None,
                result = step.execute(ctx, &state) => Some(result),
            };

            match outcome {
                None => {
                    ctx.logger
                        .warn(&format!("Run cancelled during step '{}'", step_name));
                    state.fail("cancelled");
                    return Err(PipelineError::cancelled(
                        &ctx.run_name,
                        Some(step_name),
                        state,
                    ));
                }
                Some(Err(e)) => {
                    ctx.logger.error(&format!("{} failed: {}", step_name, e));
                    ctx.logger.show_tail(step_name);
                    state.fail(e.to_string());
                    return Err(PipelineError::step_failed(&ctx.run_name, step_name, e, state));
                }
                Some(Ok(locator)) => {
                    ctx.logger
                        .success(&format!("{} -> {}", step_name, locator));
                    state.succeed(locator.clone());
                    last = Some(locator);
                }
            }
        }

        ctx.report_progress("Complete", 100, "Pipeline finished");
        ctx.logger.success("Pipeline completed successfully");

        match last {
            Some(locator) => Ok(FinalArtifact { locator, state }),
            None => Err(PipelineError::empty(&ctx.run_name)),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
