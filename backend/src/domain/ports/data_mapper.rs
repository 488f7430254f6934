//! Driven port for binding the data-mapping layer at startup.
//!
//! Binding happens exactly once, after the schema check and before any
//! component that reads data. A bound mapper owns whatever connection
//! machinery the adapter needs; lookups fail cleanly while unbound.

use async_trait::async_trait;
use thiserror::Error;

/// Failure raised while bringing up the data-mapping layer.
#[derive(Debug, Error)]
pub enum DataMapperError {
    /// The connection pool could not be constructed.
    #[error("data layer pool construction failed: {message}")]
    Pool {
        /// Underlying pool builder failure detail.
        message: String,
    },
    /// The layer came up but a connectivity probe failed.
    #[error("data layer probe failed: {message}")]
    Probe {
        /// Underlying probe failure detail.
        message: String,
    },
}

impl DataMapperError {
    /// Build a [`DataMapperError::Pool`] from any displayable cause.
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    /// Build a [`DataMapperError::Probe`] from any displayable cause.
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }
}

/// Port initialising the data-mapping layer.
#[async_trait]
pub trait DataMapper: Send + Sync {
    /// Bring the mapping layer up for the lifetime of the process.
    async fn bind(&self) -> Result<(), DataMapperError>;
}

/// Mapper that binds instantly and holds no connections.
///
/// Stands in when no database is configured and in boot-sequence tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDataMapper;

#[async_trait]
impl DataMapper for FixtureDataMapper {
    async fn bind(&self) -> Result<(), DataMapperError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn fixture_mapper_binds_without_error() {
        let mapper = FixtureDataMapper;
        assert!(mapper.bind().await.is_ok());
    }
}
