//! Job status and artifact types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Artifact slot holding the separated or converted vocal track.
pub const SLOT_VOCAL: &str = "vocal";
/// Artifact slot holding the separated accompaniment.
pub const SLOT_INSTRUMENTAL: &str = "instrumental";
/// Artifact slot holding the vocal + accompaniment mix.
pub const SLOT_COMBINED: &str = "combined";

/// Opaque reference to a playable audio artifact (usually a URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this locator points at an HTTP(S) resource.
    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Last path segment, used as a default download file name.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MediaLocator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Named artifact slots resolved by a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet(BTreeMap<String, MediaLocator>);

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot (builder pattern).
    pub fn with(mut self, slot: impl Into<String>, locator: impl Into<MediaLocator>) -> Self {
        self.insert(slot, locator);
        self
    }

    pub fn insert(&mut self, slot: impl Into<String>, locator: impl Into<MediaLocator>) {
        self.0.insert(slot.into(), locator.into());
    }

    pub fn get(&self, slot: &str) -> Option<&MediaLocator> {
        self.0.get(slot)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MediaLocator)> {
        self.0.iter().map(|(slot, locator)| (slot.as_str(), locator))
    }
}

/// Status of a backend job as observed by a status query.
///
/// `Completed` and `Failed` are terminal: once observed, the job is done
/// and polling stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Still running (or not started). `detail` is the raw status text.
    Pending { detail: Option<String> },
    /// Finished; resolved artifacts by slot.
    Completed { artifacts: ArtifactSet },
    /// The backend reported a failure.
    Failed { reason: String },
}

impl JobStatus {
    pub fn pending() -> Self {
        Self::Pending { detail: None }
    }

    pub fn pending_with(detail: impl Into<String>) -> Self {
        Self::Pending {
            detail: Some(detail.into()),
        }
    }

    pub fn completed(artifacts: ArtifactSet) -> Self {
        Self::Completed { artifacts }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Artifacts of a completed job.
    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        match self {
            Self::Completed { artifacts } => Some(artifacts),
            _ => None,
        }
    }

    /// Map a free-form status string from the backend.
    ///
    /// Matching is case-insensitive. Unknown text is treated as pending and
    /// kept as detail.
    pub fn from_status_text(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "completed" | "complete" | "done" | "success" | "finished" => {
                Self::completed(ArtifactSet::new())
            }
            "failed" | "failure" | "error" => Self::failed(trimmed),
            "" => Self::pending(),
            _ => Self::pending_with(trimmed),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { detail: Some(d) } => write!(f, "pending ({})", d),
            Self::Pending { detail: None } => f.write_str("pending"),
            Self::Completed { artifacts } => write!(f, "completed ({} artifacts)", artifacts.len()),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
