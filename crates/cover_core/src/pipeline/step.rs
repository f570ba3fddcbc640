//! Pipeline step trait definition.

use futures_util::future::BoxFuture;

use super::errors::StepResult;
use super::types::{PipelineState, RunContext};
use crate::status::MediaLocator;

/// One stage of a pipeline.
///
/// The runner calls `validate_input` and then `execute` for each step, in
/// order. `state` holds the records of every earlier step, so a step can
/// read the locators they produced.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl PipelineStep for Echo {
///     fn name(&self) -> &str { "Echo" }
///
///     fn execute<'a>(
///         &'a self,
///         ctx: &'a RunContext,
///         _state: &'a PipelineState,
///     ) -> BoxFuture<'a, StepResult<MediaLocator>> {
///         Box::pin(async move { Ok(MediaLocator::new(ctx.input.clone())) })
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Step name (for logging, state lookup and error context).
    fn name(&self) -> &str;

    /// Check preconditions before execution. Defaults to no checks.
    fn validate_input(&self, _ctx: &RunContext, _state: &PipelineState) -> StepResult<()> {
        Ok(())
    }

    /// Do the step's work and return the locator it produced.
    fn execute<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: &'a PipelineState,
    ) -> BoxFuture<'a, StepResult<MediaLocator>>;

    fn description(&self) -> &str {
        self.name()
    }
}
