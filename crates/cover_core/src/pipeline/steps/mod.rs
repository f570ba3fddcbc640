//! Steps of the voice-conversion pipeline.
//!
//! ```text
//! ConvertedVocal ──▶ Instrumental ──▶ Combine
//!   (vc_inference_check)  (download)   (combine_inferencedAudio)
//! ```

mod combine;
mod converted_vocal;
mod instrumental;

pub use combine::CombineStep;
pub use converted_vocal::ConvertedVocalStep;
pub use instrumental::InstrumentalStep;

use std::future::Future;

use super::errors::{StepError, StepResult};
use super::types::RunContext;
use crate::client::TransportResult;
use crate::poller::{wait_for_terminal_with, PollConfig, PollUpdate};
use crate::status::{JobStatus, MediaLocator};

pub const CONVERTED_VOCAL: &str = "ConvertedVocal";
pub const INSTRUMENTAL: &str = "Instrumental";
pub const COMBINE: &str = "Combine";

/// Query once, or poll until terminal when `wait` is set.
async fn resolve_status<Q, Fut>(
    ctx: &RunContext,
    operation: &str,
    wait: Option<&PollConfig>,
    mut query: Q,
) -> StepResult<JobStatus>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<JobStatus>>,
{
    match wait {
        None => query()
            .await
            .map_err(|e| StepError::transport(operation, e)),
        Some(config) => {
            let logger = &ctx.logger;
            let status = wait_for_terminal_with(query, config, ctx.cancel_token(), |update| {
                match update {
                    PollUpdate::Status(status) => logger.status(&status),
                    PollUpdate::TransportError { error, consecutive } => logger.warn(&format!(
                        "{} query failed ({} in a row): {}",
                        operation, consecutive, error
                    )),
                }
            })
            .await?;
            Ok(status)
        }
    }
}

/// The locator in `slot` of a completed status.
fn require_slot(status: JobStatus, what: &str, slot: &str) -> StepResult<MediaLocator> {
    match status {
        JobStatus::Completed { artifacts } => artifacts
            .get(slot)
            .cloned()
            .ok_or_else(|| StepError::missing_artifact(what, slot)),
        JobStatus::Failed { reason } => Err(StepError::job_failed(what, reason)),
        JobStatus::Pending { detail } => Err(StepError::not_ready(
            what,
            detail.unwrap_or_else(|| "pending".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ArtifactSet, SLOT_VOCAL};

    #[test]
    fn require_slot_maps_each_status() {
        let done = JobStatus::completed(ArtifactSet::new().with(SLOT_VOCAL, "v.wav"));
        assert_eq!(
            require_slot(done.clone(), "vocal", SLOT_VOCAL).unwrap().as_str(),
            "v.wav"
        );
        assert!(matches!(
            require_slot(done, "vocal", "other"),
            Err(StepError::MissingArtifact { .. })
        ));
        assert!(matches!(
            require_slot(JobStatus::failed("oom"), "vocal", SLOT_VOCAL),
            Err(StepError::JobFailed { .. })
        ));
        assert!(matches!(
            require_slot(JobStatus::pending(), "vocal", SLOT_VOCAL),
            Err(StepError::NotReady { .. })
        ));
    }
}
