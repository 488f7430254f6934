//! Diesel-backed data-mapper initialisation.
//!
//! The mapper owns the connection pool. It starts unbound; the boot sequence
//! calls [`DataMapper::bind`] exactly once, after the schema check, and the
//! lookup adapter reads the pool through [`DieselDataMapper::pool`].

use std::sync::OnceLock;

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use tracing::info;

use crate::domain::ports::{DataMapper, DataMapperError};
use crate::persistence::pool::{DbPool, PoolConfig};

/// Pool-owning mapper for PostgreSQL.
pub struct DieselDataMapper {
    config: PoolConfig,
    pool: OnceLock<DbPool>,
}

impl DieselDataMapper {
    /// Prepare a mapper; no connections are opened until `bind` runs.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pool: OnceLock::new(),
        }
    }

    /// The bound pool, or `None` before `bind` has completed.
    pub fn pool(&self) -> Option<DbPool> {
        self.pool.get().cloned()
    }
}

#[async_trait]
impl DataMapper for DieselDataMapper {
    async fn bind(&self) -> Result<(), DataMapperError> {
        if self.pool.get().is_some() {
            return Ok(());
        }
        let pool = DbPool::new(self.config.clone())
            .await
            .map_err(|err| DataMapperError::pool(err.to_string()))?;

        // Probe one connection so a dead database fails the boot step
        // instead of the first request.
        let mut conn = pool
            .get()
            .await
            .map_err(|err| DataMapperError::probe(err.to_string()))?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(|err| DataMapperError::probe(err.to_string()))?;
        drop(conn);

        // `set` fails only if a concurrent bind already stored a pool.
        let _ = self.pool.set(pool);
        info!("data layer bound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapper_starts_unbound() {
        let mapper = DieselDataMapper::new(PoolConfig::new("postgres://localhost/lend_manager"));
        assert!(mapper.pool().is_none());
    }
}
