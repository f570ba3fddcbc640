//! Combine step: mixes the converted vocal with the instrumental.

use futures_util::future::BoxFuture;

use super::{COMBINE, CONVERTED_VOCAL, INSTRUMENTAL};
use crate::client::BackendClient;
use crate::pipeline::errors::{StepError, StepResult};
use crate::pipeline::step::PipelineStep;
use crate::pipeline::types::{PipelineState, RunContext};
use crate::status::MediaLocator;

pub struct CombineStep {
    client: BackendClient,
    vocal_step: String,
    instrumental_step: String,
}

impl CombineStep {
    /// Combine the outputs of the standard vocal and instrumental steps.
    pub fn new(client: BackendClient) -> Self {
        Self::from_steps(client, CONVERTED_VOCAL, INSTRUMENTAL)
    }

    /// Combine the outputs of two named earlier steps (`url1`, `url2`).
    pub fn from_steps(
        client: BackendClient,
        vocal_step: impl Into<String>,
        instrumental_step: impl Into<String>,
    ) -> Self {
        Self {
            client,
            vocal_step: vocal_step.into(),
            instrumental_step: instrumental_step.into(),
        }
    }

    fn inputs<'s>(&self, state: &'s PipelineState) -> StepResult<(&'s MediaLocator, &'s MediaLocator)> {
        let vocal = state.locator(&self.vocal_step).ok_or_else(|| {
            StepError::invalid_input(format!("no locator from step '{}'", self.vocal_step))
        })?;
        let instrumental = state.locator(&self.instrumental_step).ok_or_else(|| {
            StepError::invalid_input(format!(
                "no locator from step '{}'",
                self.instrumental_step
            ))
        })?;
        Ok((vocal, instrumental))
    }
}

impl PipelineStep for CombineStep {
    fn name(&self) -> &str {
        COMBINE
    }

    fn description(&self) -> &str {
        "Combine vocal and instrumental"
    }

    fn validate_input(&self, _ctx: &RunContext, state: &PipelineState) -> StepResult<()> {
        self.inputs(state).map(|_| ())
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: &'a PipelineState,
    ) -> BoxFuture<'a, StepResult<MediaLocator>> {
        Box::pin(async move {
            let (vocal, instrumental) = self.inputs(state)?;
            ctx.logger
                .request(&format!("combine_inferencedAudio {} + {}", vocal, instrumental));

            self.client
                .combine(&ctx.identity, vocal, instrumental)
                .await
                .map_err(|e| StepError::transport("combine_inferencedAudio", e))
        })
    }
}
