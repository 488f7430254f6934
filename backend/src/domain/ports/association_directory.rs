//! Driven port for fetching the association lookup collection.
//!
//! The refresh stage calls this on every business request and publishes the
//! result to the shared cache, so implementations should stay cheap. Failures
//! abort the request rather than serving a stale or partial view.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::association::Association;

/// Failure raised while fetching the association collection.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory's backing store is not reachable or not bound yet.
    #[error("association directory unavailable: {message}")]
    Unavailable {
        /// Human-readable connectivity detail.
        message: String,
    },
    /// The store answered but the query itself failed.
    #[error("association query failed: {message}")]
    Query {
        /// Underlying query failure detail.
        message: String,
    },
}

impl DirectoryError {
    /// Build a [`DirectoryError::Unavailable`] from any displayable cause.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build a [`DirectoryError::Query`] from any displayable cause.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Port answering "what associations exist right now".
#[async_trait]
pub trait AssociationDirectory: Send + Sync {
    /// Fetch the full, current association collection.
    async fn fetch_all(&self) -> Result<Vec<Association>, DirectoryError>;
}

/// Directory serving a small fixed collection.
///
/// Keeps the views populated when no database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAssociationDirectory;

impl FixtureAssociationDirectory {
    fn records() -> Vec<Association> {
        vec![
            Association::new(1, "Tool Library"),
            Association::new(2, "Maker Collective"),
        ]
    }
}

#[async_trait]
impl AssociationDirectory for FixtureAssociationDirectory {
    async fn fetch_all(&self) -> Result<Vec<Association>, DirectoryError> {
        Ok(Self::records())
    }
}
