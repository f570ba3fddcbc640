//! Multi-step pipeline runner.
//!
//! Steps run strictly in order; each sees the records of the steps before
//! it. The first failure aborts the run, and a cancelled run stops the
//! running step and starts no other.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(client: cover_core::client::BackendClient) {
//! use cover_core::identity::IdentityContext;
//! use cover_core::pipeline::{create_conversion_pipeline, RunContext};
//!
//! let pipeline = create_conversion_pipeline(client, None, None);
//! let ctx = RunContext::new(IdentityContext::new("111", "lee"), "Get_Lucky.wav");
//! match pipeline.run(&ctx).await {
//!     Ok(result) => println!("combined track: {}", result.locator),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```

mod errors;
mod runner;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use runner::Pipeline;
pub use step::PipelineStep;
pub use types::{
    FinalArtifact, PipelineState, ProgressCallback, RunContext, StepOutcome, StepRecord,
};

use crate::client::BackendClient;
use crate::poller::PollConfig;
use steps::{CombineStep, ConvertedVocalStep, InstrumentalStep};

/// Converted vocal → instrumental → combined track.
///
/// With a poll config, the first two steps wait for their artifact;
/// without one, an artifact that is not ready fails the run.
pub fn create_conversion_pipeline(
    client: BackendClient,
    inference_wait: Option<PollConfig>,
    separation_wait: Option<PollConfig>,
) -> Pipeline {
    Pipeline::new()
        .with_step(ConvertedVocalStep::new(client.clone(), inference_wait))
        .with_step(InstrumentalStep::new(client.clone(), separation_wait))
        .with_step(CombineStep::new(client))
}
