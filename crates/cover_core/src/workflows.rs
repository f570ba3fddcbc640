//! View-facing workflows: song search, separation, training and
//! voice conversion.
//!
//! Each workflow bundles the identity, backend client, upload submitter and
//! poll cadence a view needs, so views never build requests themselves.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{BackendClient, Endpoint, TransportError};
use crate::config::{PollingSettings, Settings};
use crate::identity::{IdentityContext, IdentityError};
use crate::logging::SessionLogger;
use crate::pipeline::{
    create_conversion_pipeline, steps, FinalArtifact, Pipeline, PipelineError, PipelineState,
    ProgressCallback, RunContext,
};
use crate::poller::{
    start_polling, wait_for_terminal_with, PollConfig, PollError, PollHandle, PollOutcome,
    PollUpdate,
};
use crate::status::{JobStatus, MediaLocator};
use crate::upload::{JobRequest, ServerAck, SubmissionError, UploadFile, UploadSubmitter};

/// Errors surfaced to views.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Search input is empty")]
    EmptyInput,

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Pipeline finished without a track from step '{0}'")]
    MissingStepOutput(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// An accepted upload and the filename later status queries use.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub filename: String,
    pub ack: ServerAck,
}

async fn read_upload(path: &Path) -> WorkflowResult<UploadFile> {
    UploadFile::from_path(path)
        .await
        .map_err(|source| WorkflowError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Entry point holding the shared collaborators.
#[derive(Clone)]
pub struct CoverStudio {
    client: BackendClient,
    submitter: UploadSubmitter,
    identity: IdentityContext,
    polling: PollingSettings,
}

impl CoverStudio {
    pub fn new(client: BackendClient, identity: IdentityContext, polling: PollingSettings) -> Self {
        Self {
            submitter: UploadSubmitter::new(client.clone()),
            client,
            identity,
            polling,
        }
    }

    /// Build from settings with an HTTP transport.
    pub fn from_settings(settings: &Settings) -> WorkflowResult<Self> {
        let client = BackendClient::from_settings(&settings.backend)?;
        let identity = IdentityContext::from_settings(&settings.identity);
        Ok(Self::new(client, identity, settings.polling.clone()))
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn search(&self) -> SongSearch {
        SongSearch {
            client: self.client.clone(),
            identity: self.identity.clone(),
        }
    }

    pub fn separation(&self) -> SeparationWorkflow {
        SeparationWorkflow {
            client: self.client.clone(),
            submitter: self.submitter.clone(),
            identity: self.identity.clone(),
            poll: self.polling.separation(),
        }
    }

    pub fn training(&self) -> TrainingWorkflow {
        TrainingWorkflow {
            client: self.client.clone(),
            submitter: self.submitter.clone(),
            identity: self.identity.clone(),
            poll: self.polling.training(),
        }
    }

    pub fn conversion(&self) -> ConversionWorkflow {
        ConversionWorkflow {
            client: self.client.clone(),
            submitter: self.submitter.clone(),
            identity: self.identity.clone(),
            inference_poll: self.polling.inference(),
            separation_poll: self.polling.separation(),
            logger: None,
        }
    }
}

/// Song search by title, artist or URL.
pub struct SongSearch {
    client: BackendClient,
    identity: IdentityContext,
}

impl SongSearch {
    /// Resolve `input` to the downloaded song's locator.
    pub async fn search(&self, input: &str) -> WorkflowResult<MediaLocator> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WorkflowError::EmptyInput);
        }
        self.identity.validate()?;
        info!("Searching for '{}'", input);
        Ok(self.client.download_youtube(&self.identity, input).await?)
    }
}

/// Vocal/instrument separation of one song.
pub struct SeparationWorkflow {
    client: BackendClient,
    submitter: UploadSubmitter,
    identity: IdentityContext,
    poll: PollConfig,
}

impl SeparationWorkflow {
    pub async fn submit(&self, file: UploadFile) -> WorkflowResult<SubmittedJob> {
        let filename = file.file_name.clone();
        let request = JobRequest::builder(self.identity.clone()).file(file).build();
        let ack = self.submitter.submit(Endpoint::Separate, &request).await?;
        Ok(SubmittedJob { filename, ack })
    }

    pub async fn submit_path(&self, path: &Path) -> WorkflowResult<SubmittedJob> {
        self.submit(read_upload(path).await?).await
    }

    /// One status query.
    pub async fn check(&self, filename: &str) -> WorkflowResult<JobStatus> {
        Ok(self.client.separation_status(&self.identity, filename).await?)
    }

    /// Poll in the background at the separation interval.
    ///
    /// Polling stops when the returned handle is dropped.
    pub fn watch<U, T>(&self, filename: &str, on_update: U, on_terminal: T) -> PollHandle
    where
        U: FnMut(PollUpdate) + Send + 'static,
        T: FnOnce(PollOutcome) + Send + 'static,
    {
        let client = self.client.clone();
        let identity = self.identity.clone();
        let filename = filename.to_string();
        start_polling(
            move || {
                let client = client.clone();
                let identity = identity.clone();
                let filename = filename.clone();
                async move { client.separation_status(&identity, &filename).await }
            },
            self.poll.clone(),
            on_update,
            on_terminal,
        )
    }

    /// Poll until the separation is terminal.
    pub async fn wait(
        &self,
        filename: &str,
        cancel: &CancellationToken,
        on_update: impl FnMut(PollUpdate),
    ) -> WorkflowResult<JobStatus> {
        let client = &self.client;
        let identity = &self.identity;
        let status = wait_for_terminal_with(
            move || client.separation_status(identity, filename),
            &self.poll,
            cancel,
            on_update,
        )
        .await?;
        Ok(status)
    }
}

/// Voice model training for the identity's collection.
pub struct TrainingWorkflow {
    client: BackendClient,
    submitter: UploadSubmitter,
    identity: IdentityContext,
    poll: PollConfig,
}

impl TrainingWorkflow {
    /// Upload training data. At least one file is required.
    pub async fn submit(&self, files: Vec<UploadFile>) -> WorkflowResult<ServerAck> {
        let request = JobRequest::builder(self.identity.clone())
            .files(files)
            .build();
        Ok(self.submitter.submit(Endpoint::VcTraining, &request).await?)
    }

    pub async fn submit_paths(&self, paths: &[PathBuf]) -> WorkflowResult<ServerAck> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(read_upload(path).await?);
        }
        self.submit(files).await
    }

    /// Manual status check.
    pub async fn check_status(&self) -> WorkflowResult<JobStatus> {
        Ok(self.client.train_status(&self.identity).await?)
    }

    /// Poll until training is terminal.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        on_update: impl FnMut(PollUpdate),
    ) -> WorkflowResult<JobStatus> {
        let client = &self.client;
        let identity = &self.identity;
        let status = wait_for_terminal_with(
            move || client.train_status(identity),
            &self.poll,
            cancel,
            on_update,
        )
        .await?;
        Ok(status)
    }
}

/// Both uploads of a conversion request.
#[derive(Debug, Clone)]
pub struct ConversionUpload {
    pub filename: String,
    pub inference_ack: ServerAck,
    pub separation_ack: ServerAck,
}

/// The three tracks of a finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionArtifacts {
    pub vocal: MediaLocator,
    pub instrumental: MediaLocator,
    pub combined: MediaLocator,
    pub state: PipelineState,
}

/// Voice conversion of a song with the trained model.
pub struct ConversionWorkflow {
    client: BackendClient,
    submitter: UploadSubmitter,
    identity: IdentityContext,
    inference_poll: PollConfig,
    separation_poll: PollConfig,
    logger: Option<SessionLogger>,
}

impl ConversionWorkflow {
    /// Log pipeline runs through `logger` instead of a default one.
    pub fn with_logger(mut self, logger: SessionLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Submit the song for inference, then for separation with `vc=true`.
    ///
    /// Stops at the first failed upload; the separation upload is not sent
    /// when inference is rejected.
    pub async fn upload(&self, file: UploadFile) -> WorkflowResult<ConversionUpload> {
        let filename = file.file_name.clone();

        let inference = JobRequest::builder(self.identity.clone())
            .file(file.clone())
            .build();
        let inference_ack = self.submitter.submit(Endpoint::VcInference, &inference).await?;

        let separation = JobRequest::builder(self.identity.clone())
            .file(file)
            .flag("vc", true)
            .build();
        let separation_ack = self.submitter.submit(Endpoint::Separate, &separation).await?;

        Ok(ConversionUpload {
            filename,
            inference_ack,
            separation_ack,
        })
    }

    pub async fn upload_path(&self, path: &Path) -> WorkflowResult<ConversionUpload> {
        self.upload(read_upload(path).await?).await
    }

    /// The conversion pipeline. With `wait`, steps poll until their
    /// artifact is ready.
    pub fn pipeline(&self, wait: bool) -> Pipeline {
        let (inference, separation) = if wait {
            (
                Some(self.inference_poll.clone()),
                Some(self.separation_poll.clone()),
            )
        } else {
            (None, None)
        };
        create_conversion_pipeline(self.client.clone(), inference, separation)
    }

    /// Resolve the converted vocal and instrumental, then combine them.
    pub async fn run(
        &self,
        filename: &str,
        wait: bool,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> WorkflowResult<ConversionArtifacts> {
        self.identity.validate()?;

        let mut ctx = RunContext::new(self.identity.clone(), filename).with_cancel_token(cancel);
        if let Some(progress) = progress {
            ctx = ctx.with_progress_callback(progress);
        }
        if let Some(logger) = &self.logger {
            ctx = ctx.with_logger(logger.clone());
        }

        let result = self.pipeline(wait).run(&ctx).await?;
        conversion_artifacts(result)
    }
}

fn conversion_artifacts(result: FinalArtifact) -> WorkflowResult<ConversionArtifacts> {
    let locator = |step: &str| {
        result
            .state
            .locator(step)
            .cloned()
            .ok_or_else(|| WorkflowError::MissingStepOutput(step.to_string()))
    };

    Ok(ConversionArtifacts {
        vocal: locator(steps::CONVERTED_VOCAL)?,
        instrumental: locator(steps::INSTRUMENTAL)?,
        combined: result.locator.clone(),
        state: result.state.clone(),
    })
}
