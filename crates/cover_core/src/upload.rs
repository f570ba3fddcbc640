//! Upload submitter: packages files plus identity fields into one multipart
//! request per job.
//!
//! Requests are validated before anything touches the network, each
//! submission issues exactly one request, and nothing is retried. A
//! per-job in-flight guard rejects a second submission of the same job
//! while the first one is still running.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{BackendClient, BackendRequest, Endpoint, MultipartForm, TransportError};
use crate::identity::IdentityContext;

/// A local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Multipart field name (set by the submitter from the endpoint shape).
    pub field: String,
    /// File name reported to the backend.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Content type, guessed from the extension when loaded from disk.
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).map(str::to_string);
        Self {
            field: String::new(),
            file_name,
            bytes,
            mime,
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(file_name, bytes))
    }

    fn for_field(&self, field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..self.clone()
        }
    }
}

fn guess_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "flac" => Some("audio/flac"),
        "ogg" => Some("audio/ogg"),
        "m4a" => Some("audio/mp4"),
        _ => None,
    }
}

/// One finalized upload: identity, files and extra flags.
///
/// Built with `JobRequest::builder` and immutable afterwards.
#[derive(Debug, Clone)]
pub struct JobRequest {
    identity: IdentityContext,
    files: Vec<UploadFile>,
    extra_flags: BTreeMap<String, String>,
}

impl JobRequest {
    pub fn builder(identity: IdentityContext) -> JobRequestBuilder {
        JobRequestBuilder {
            identity,
            files: Vec::new(),
            extra_flags: BTreeMap::new(),
        }
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn extra_flags(&self) -> &BTreeMap<String, String> {
        &self.extra_flags
    }

    /// File names in submission order.
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.file_name.clone()).collect()
    }
}

/// Builder for `JobRequest`.
pub struct JobRequestBuilder {
    identity: IdentityContext,
    files: Vec<UploadFile>,
    extra_flags: BTreeMap<String, String>,
}

impl JobRequestBuilder {
    pub fn file(mut self, file: UploadFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn files(mut self, files: impl IntoIterator<Item = UploadFile>) -> Self {
        self.files.extend(files);
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.extra_flags.insert(name.into(), value.to_string());
        self
    }

    pub fn build(self) -> JobRequest {
        JobRequest {
            identity: self.identity,
            files: self.files,
            extra_flags: self.extra_flags,
        }
    }
}

/// Server acknowledgement, passed through unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAck {
    pub endpoint: Endpoint,
    pub body: String,
}

/// Errors from `UploadSubmitter::submit`.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The request violates an upload constraint; nothing was sent.
    #[error("Invalid {endpoint} request: {message}")]
    InvalidRequest { endpoint: Endpoint, message: String },

    /// The same job is already being submitted; nothing was sent.
    #[error("A {endpoint} upload for {files:?} is already in flight")]
    AlreadyInFlight { endpoint: Endpoint, files: Vec<String> },

    /// The request was sent and failed.
    #[error("Upload to {endpoint} failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: TransportError,
    },
}

impl SubmissionError {
    pub fn invalid(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            endpoint,
            message: message.into(),
        }
    }

    /// Whether a request reached the network before failing.
    pub fn was_sent(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Key identifying "the same job" for the in-flight guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JobKey {
    endpoint: Endpoint,
    identity: IdentityContext,
    files: Vec<String>,
}

type InFlightMap = Arc<Mutex<HashMap<JobKey, Uuid>>>;

/// Guard token; releases its job key on drop.
struct InFlightToken {
    registry: InFlightMap,
    key: JobKey,
    token: Uuid,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        let mut active = self.registry.lock();
        if active.get(&self.key) == Some(&self.token) {
            active.remove(&self.key);
        }
    }
}

/// Sends upload jobs to the backend.
///
/// Clones share the same in-flight registry.
#[derive(Clone)]
pub struct UploadSubmitter {
    client: BackendClient,
    in_flight: InFlightMap,
}

impl UploadSubmitter {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit one upload job.
    pub async fn submit(
        &self,
        endpoint: Endpoint,
        request: &JobRequest,
    ) -> Result<ServerAck, SubmissionError> {
        validate(endpoint, request)?;

        let _token = self.acquire(endpoint, request)?;
        let form = build_form(endpoint, request);

        info!(
            "Uploading {} file(s) to {} for {}/{}",
            request.files.len(),
            endpoint,
            request.identity.owner,
            request.identity.collection
        );

        match self
            .client
            .send(BackendRequest::multipart(endpoint, form))
            .await
        {
            Ok(body) => {
                info!("{} accepted upload", endpoint);
                Ok(ServerAck { endpoint, body })
            }
            Err(source) => {
                warn!("Upload to {} failed: {}", endpoint, source);
                Err(SubmissionError::Transport { endpoint, source })
            }
        }
    }

    /// Whether this job is currently being submitted.
    pub fn is_in_flight(&self, endpoint: Endpoint, request: &JobRequest) -> bool {
        self.in_flight
            .lock()
            .contains_key(&job_key(endpoint, request))
    }

    fn acquire(
        &self,
        endpoint: Endpoint,
        request: &JobRequest,
    ) -> Result<InFlightToken, SubmissionError> {
        let key = job_key(endpoint, request);
        let mut active = self.in_flight.lock();
        if active.contains_key(&key) {
            return Err(SubmissionError::AlreadyInFlight {
                endpoint,
                files: key.files,
            });
        }
        let token = Uuid::new_v4();
        active.insert(key.clone(), token);
        Ok(InFlightToken {
            registry: Arc::clone(&self.in_flight),
            key,
            token,
        })
    }
}

fn job_key(endpoint: Endpoint, request: &JobRequest) -> JobKey {
    JobKey {
        endpoint,
        identity: request.identity.clone(),
        files: request.file_names(),
    }
}

fn validate(endpoint: Endpoint, request: &JobRequest) -> Result<(), SubmissionError> {
    let shape = endpoint
        .upload_shape()
        .ok_or_else(|| SubmissionError::invalid(endpoint, "not an upload endpoint"))?;

    request
        .identity
        .validate()
        .map_err(|e| SubmissionError::invalid(endpoint, e.to_string()))?;

    match (shape, request.files.len()) {
        (_, 0) => Err(SubmissionError::invalid(endpoint, "no files selected")),
        (crate::client::UploadShape::Single, n) if n > 1 => Err(SubmissionError::invalid(
            endpoint,
            format!("expects exactly one file, got {}", n),
        )),
        _ => Ok(()),
    }
}

fn build_form(endpoint: Endpoint, request: &JobRequest) -> MultipartForm {
    let field = endpoint
        .upload_shape()
        .map(|shape| shape.file_field())
        .unwrap_or("files");

    let mut form = MultipartForm::new();
    for (name, value) in request.identity.fields() {
        form = form.text(name, value);
    }
    for (name, value) in &request.extra_flags {
        form = form.text(name, value);
    }
    for file in &request.files {
        form = form.file(file.for_field(field));
    }
    form
}
