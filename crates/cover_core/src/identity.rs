//! Identity context threaded through every backend call.
//!
//! The backend keys all work by an owner (`user_id`) and a collection
//! (`artist`). Callers build one `IdentityContext` per session and pass it
//! to each operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IdentitySettings;

/// Error returned when an identity is missing one of its fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("owner identity (user_id) is empty")]
    MissingOwner,

    #[error("collection identity (artist) is empty")]
    MissingCollection,
}

/// Owner/collection pair identifying whose jobs a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Owner identity, sent as `user_id`.
    pub owner: String,
    /// Collection identity, sent as `artist`.
    pub collection: String,
}

impl IdentityContext {
    pub fn new(owner: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            collection: collection.into(),
        }
    }

    /// Build from the `[identity]` config section.
    pub fn from_settings(settings: &IdentitySettings) -> Self {
        Self::new(&settings.user_id, &settings.artist)
    }

    /// Check both fields are present.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.owner.trim().is_empty() {
            return Err(IdentityError::MissingOwner);
        }
        if self.collection.trim().is_empty() {
            return Err(IdentityError::MissingCollection);
        }
        Ok(())
    }

    /// Form/JSON field pairs in the order the backend expects them.
    pub fn fields(&self) -> [(&'static str, &str); 2] {
        [("user_id", &self.owner), ("artist", &self.collection)]
    }
}
