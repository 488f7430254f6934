//! Driven port confirming the persisted schema before anything else runs.
//!
//! The boot sequence refuses to bring up the data layer, routes, or the
//! listener while the store's schema lags behind the code. Implementations
//! decide what "current" means; the orchestrator only needs a yes or no.

use async_trait::async_trait;
use thiserror::Error;

/// Failure raised when the persisted schema cannot be confirmed current.
#[derive(Debug, Error)]
pub enum SchemaGuardError {
    /// The backing store could not be reached or queried.
    #[error("schema check failed: {message}")]
    Unavailable {
        /// Human-readable connection or query failure detail.
        message: String,
    },
    /// Known migrations have not been applied yet.
    #[error("schema is behind: pending migrations [{names}]")]
    Pending {
        /// Comma-separated names of the unapplied migrations.
        names: String,
    },
}

impl SchemaGuardError {
    /// Build an [`SchemaGuardError::Unavailable`] from any displayable cause.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build an [`SchemaGuardError::Pending`] from the unapplied migration names.
    pub fn pending(names: impl Into<String>) -> Self {
        Self::Pending {
            names: names.into(),
        }
    }
}

/// Port guarding startup on schema currency.
#[async_trait]
pub trait SchemaGuard: Send + Sync {
    /// Confirm the persisted schema matches what the code expects.
    async fn check(&self) -> Result<(), SchemaGuardError>;
}

/// Guard that treats the schema as always current.
///
/// Used when no database is configured and by tests exercising the boot
/// sequence without persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSchemaGuard;

#[async_trait]
impl SchemaGuard for FixtureSchemaGuard {
    async fn check(&self) -> Result<(), SchemaGuardError> {
        Ok(())
    }
}
