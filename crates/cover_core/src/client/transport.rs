//! Transport seam between the orchestration layer and HTTP.
//!
//! Everything above this module builds `BackendRequest` values and hands
//! them to a `Transport`. `HttpTransport` sends them with reqwest; tests
//! substitute a scripted transport that records what would have been sent.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::debug;

use super::endpoints::{Endpoint, Method};
use super::error::{TransportError, TransportResult};
use crate::config::BackendSettings;
use crate::upload::UploadFile;

/// Multipart form: scalar fields followed by file parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadFile>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, file: UploadFile) -> Self {
        self.files.push(file);
        self
    }

    /// Value of the first scalar field with this name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn into_reqwest(self) -> TransportResult<Form> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let mut part = Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(mime) = file.mime.as_deref() {
                part = part.mime_str(mime)?;
            }
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

/// Request payload shapes used by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// URL query parameters (GET endpoints).
    Query(Vec<(String, String)>),
    /// JSON object body.
    Json(serde_json::Value),
    /// Multipart upload.
    Multipart(MultipartForm),
}

/// One request to one backend endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub endpoint: Endpoint,
    pub body: RequestBody,
}

impl BackendRequest {
    pub fn query(endpoint: Endpoint, pairs: Vec<(String, String)>) -> Self {
        Self {
            endpoint,
            body: RequestBody::Query(pairs),
        }
    }

    pub fn json(endpoint: Endpoint, value: serde_json::Value) -> Self {
        Self {
            endpoint,
            body: RequestBody::Json(value),
        }
    }

    pub fn multipart(endpoint: Endpoint, form: MultipartForm) -> Self {
        Self {
            endpoint,
            body: RequestBody::Multipart(form),
        }
    }

    /// JSON body, if this is a JSON request.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Multipart form, if this is an upload.
    pub fn form(&self) -> Option<&MultipartForm> {
        match &self.body {
            RequestBody::Multipart(form) => Some(form),
            _ => None,
        }
    }
}

/// Sends a single request and returns the raw response body.
///
/// Implementations must issue exactly one exchange per call and must not
/// retry.
pub trait Transport: Send + Sync {
    fn send(&self, request: BackendRequest) -> BoxFuture<'_, TransportResult<String>>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for the backend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Create a transport reusing an existing reqwest client.
    pub fn with_client(client: Client, base_url: &str) -> TransportResult<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| TransportError::invalid_url(base_url, e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &BackendSettings) -> TransportResult<Self> {
        Self::new(
            &settings.base_url,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// The underlying reqwest client (shared with artifact downloads).
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an endpoint.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> TransportResult<Url> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| TransportError::invalid_url(endpoint.path(), e.to_string()))
    }

    async fn send_request(&self, request: BackendRequest) -> TransportResult<String> {
        let url = self.endpoint_url(request.endpoint)?;
        debug!("{:?} {}", request.endpoint.method(), url);

        let builder = match request.endpoint.method() {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        let builder = match request.body {
            RequestBody::Query(pairs) => builder.query(&pairs),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form.into_reqwest()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), body));
        }

        Ok(body)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: BackendRequest) -> BoxFuture<'_, TransportResult<String>> {
        Box::pin(self.send_request(request))
    }
}
