//! Instrumental step: resolves the separated instrumental track.

use futures_util::future::BoxFuture;

use super::{require_slot, resolve_status, INSTRUMENTAL};
use crate::client::BackendClient;
use crate::pipeline::errors::StepResult;
use crate::pipeline::step::PipelineStep;
use crate::pipeline::types::{PipelineState, RunContext};
use crate::poller::PollConfig;
use crate::status::{MediaLocator, SLOT_INSTRUMENTAL};

pub struct InstrumentalStep {
    client: BackendClient,
    wait: Option<PollConfig>,
}

impl InstrumentalStep {
    pub fn new(client: BackendClient, wait: Option<PollConfig>) -> Self {
        Self { client, wait }
    }
}

impl PipelineStep for InstrumentalStep {
    fn name(&self) -> &str {
        INSTRUMENTAL
    }

    fn description(&self) -> &str {
        "Fetch instrumental track"
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
            ctx.logger.request(&format!("download {}", filename));

            let status = resolve_status(ctx, "download", self.wait.as_ref(), move || {
                client.separation_status(identity, filename)
            })
            .await?;

            require_slot(status, "instrumental track", SLOT_INSTRUMENTAL)
        })
    }
}
