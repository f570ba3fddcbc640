//! Converted vocal step: resolves the voice-converted vocal track.

use futures_util::future::BoxFuture;

use super::{require_slot, resolve_status, CONVERTED_VOCAL};
use crate::client::BackendClient;
use crate::pipeline::errors::StepResult;
use crate::pipeline::step::PipelineStep;
use crate::pipeline::types::{PipelineState, RunContext};
use crate::poller::PollConfig;
use crate::status::{MediaLocator, SLOT_VOCAL};

pub struct ConvertedVocalStep {
    client: BackendClient,
    wait: Option<PollConfig>,
}

impl ConvertedVocalStep {
    /// Without `wait`, a conversion that is still running fails the step.
    pub fn new(client: BackendClient, wait: Option<PollConfig>) -> Self {
        Self { client, wait }
    }
}

impl PipelineStep for ConvertedVocalStep {
    fn name(&self) -> &str {
        CONVERTED_VOCAL
    }

    fn description(&self) -> &str {
        "Fetch converted vocal"
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a RunContext,
        _state: &'a PipelineState,
    ) -> BoxFuture<'a, StepResult<MediaLocator>> {
        Box::pin(async move {
            let client = &self.client;
            let identity = &ctx.identity;
            let filename = ctx.input.as_str();
            ctx.logger.request(&format!("vc_inference_check {}", filename));

            let status = resolve_status(ctx, "vc_inference_check", self.wait.as_ref(), move || {
                client.inference_status(identity, filename)
            })
            .await?;

            require_slot(status, "converted vocal", SLOT_VOCAL)
        })
    }
}
