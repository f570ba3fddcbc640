//! Typed wrapper over the backend endpoints.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::endpoints::Endpoint;
use super::error::{TransportError, TransportResult};
use super::transport::{BackendRequest, HttpTransport, Transport};
use crate::config::BackendSettings;
use crate::identity::IdentityContext;
use crate::status::{ArtifactSet, JobStatus, MediaLocator, SLOT_INSTRUMENTAL, SLOT_VOCAL};

const AUDIO_EXTENSIONS: [&str; 5] = [".wav", ".mp3", ".flac", ".ogg", ".m4a"];

/// Body of the separation status endpoint.
#[derive(Debug, Deserialize)]
struct SeparationStatusResponse {
    status: String,
    #[serde(default)]
    vocal: Option<String>,
    #[serde(default)]
    instrum: Option<String>,
}

/// Client for the backend's non-upload endpoints.
///
/// Cheap to clone; all clones share one transport.
#[derive(Clone)]
pub struct BackendClient {
    transport: Arc<dyn Transport>,
}

impl BackendClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build a client with an HTTP transport from the `[backend]` settings.
    pub fn from_settings(settings: &BackendSettings) -> TransportResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::from_settings(settings)?)))
    }

    /// Send a raw request through the transport.
    pub async fn send(&self, request: BackendRequest) -> TransportResult<String> {
        self.transport.send(request).await
    }

    /// Search for a song (title/artist or URL) and return its audio locator.
    pub async fn download_youtube(
        &self,
        identity: &IdentityContext,
        input: &str,
    ) -> TransportResult<MediaLocator> {
        let request = BackendRequest::query(
            Endpoint::DownloadYoutube,
            vec![
                ("input".to_string(), input.to_string()),
                ("user_id".to_string(), identity.owner.clone()),
            ],
        );
        let body = self.send(request).await?;
        require_locator(Endpoint::DownloadYoutube, &body)
    }

    /// Query separation status for an uploaded file.
    pub async fn separation_status(
        &self,
        identity: &IdentityContext,
        filename: &str,
    ) -> TransportResult<JobStatus> {
        let request = BackendRequest::json(
            Endpoint::Download,
            json!({
                "user_id": identity.owner,
                "artist": identity.collection,
                "filename": filename,
            }),
        );
        let body = self.send(request).await?;
        parse_separation_status(&body)
    }

    /// Query the training status of the identity's voice model.
    pub async fn train_status(&self, identity: &IdentityContext) -> TransportResult<JobStatus> {
        let request = BackendRequest::json(
            Endpoint::VcTrainCheck,
            json!({
                "user_id": identity.owner,
                "artist": identity.collection,
            }),
        );
        let body = self.send(request).await?;
        Ok(JobStatus::from_status_text(&decode_text(&body)?))
    }

    /// Query the converted vocal for an inference upload.
    ///
    /// A locator in the response means the conversion is done; any other
    /// text is a status message.
    pub async fn inference_status(
        &self,
        identity: &IdentityContext,
        filename: &str,
    ) -> TransportResult<JobStatus> {
        let request = BackendRequest::json(
            Endpoint::VcInferenceCheck,
            json!({
                "user_id": identity.owner,
                "artist": identity.collection,
                "filename": filename,
            }),
        );
        let body = self.send(request).await?;
        let text = decode_text(&body)?;
        if looks_like_locator(&text) {
            Ok(JobStatus::completed(
                ArtifactSet::new().with(SLOT_VOCAL, text),
            ))
        } else {
            Ok(JobStatus::from_status_text(&text))
        }
    }

    /// Mix two tracks; returns the combined locator.
    pub async fn combine(
        &self,
        identity: &IdentityContext,
        url1: &MediaLocator,
        url2: &MediaLocator,
    ) -> TransportResult<MediaLocator> {
        let request = BackendRequest::json(
            Endpoint::CombineInferencedAudio,
            combine_body(identity, url1, url2),
        );
        let body = self.send(request).await?;
        require_locator(Endpoint::CombineInferencedAudio, &body)
    }
}

/// Request body for the combine endpoint: exactly `url1`, `url2`, `user_id`.
pub fn combine_body(
    identity: &IdentityContext,
    url1: &MediaLocator,
    url2: &MediaLocator,
) -> serde_json::Value {
    json!({
        "url1": url1.as_str(),
        "url2": url2.as_str(),
        "user_id": identity.owner,
    })
}

/// Response text with JSON string quoting removed.
fn decode_text(body: &str) -> TransportResult<String> {
    let trimmed = body.trim();
    if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed)
            .map(|s| s.trim().to_string())
            .map_err(|e| TransportError::decode("string response", e.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

fn require_locator(endpoint: Endpoint, body: &str) -> TransportResult<MediaLocator> {
    let text = decode_text(body)?;
    if text.is_empty() {
        return Err(TransportError::decode(
            format!("{} response", endpoint),
            "empty locator",
        ));
    }
    Ok(MediaLocator::new(text))
}

fn looks_like_locator(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn parse_separation_status(body: &str) -> TransportResult<JobStatus> {
    let response: SeparationStatusResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::decode("separation status", e.to_string()))?;
    debug!("Separation status: {}", response.status);

    let status = match JobStatus::from_status_text(&response.status) {
        JobStatus::Completed { .. } => {
            let mut artifacts = ArtifactSet::new();
            if let Some(vocal) = response.vocal.filter(|v| !v.is_empty()) {
                artifacts.insert(SLOT_VOCAL, vocal);
            }
            if let Some(instrum) = response.instrum.filter(|v| !v.is_empty()) {
                artifacts.insert(SLOT_INSTRUMENTAL, instrum);
            }
            JobStatus::completed(artifacts)
        }
        other => other,
    };
    Ok(status)
}
