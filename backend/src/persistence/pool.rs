//! Connection pooling for the PostgreSQL lookup path.
//!
//! `diesel-async` drives the connections and `bb8` owns the pool, so
//! checkouts await instead of blocking a worker. The connection cap and
//! checkout deadline come from the boot settings; the pool keeps a small
//! idle floor warm so steady traffic never pays the connect cost.

use std::time::Duration;

use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_FLOOR: u32 = 2;

/// Pool failures, split by the phase they occur in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool could not be built or its idle floor warmed.
    #[error("connection pool setup failed: {0}")]
    Setup(String),

    /// No connection became available before the checkout deadline.
    #[error("connection checkout failed: {0}")]
    Checkout(String),
}

impl PoolError {
    fn setup(source: impl ToString) -> Self {
        Self::Setup(source.to_string())
    }

    fn checkout(source: impl ToString) -> Self {
        Self::Checkout(source.to_string())
    }
}

/// Sizing and checkout behaviour for [`DbPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    database_url: String,
    max_connections: u32,
    checkout_timeout: Duration,
}

impl PoolConfig {
    /// Configuration for `database_url` with default sizing.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
        }
    }

    /// Cap the pool at `max_connections`.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Fail checkouts that cannot be served within `timeout`.
    #[must_use]
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    // Two warm connections, or fewer when the cap itself is smaller.
    fn idle_floor(&self) -> u32 {
        self.max_connections.min(IDLE_FLOOR)
    }
}

/// Shared handle to the async connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool and warm its idle floor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Setup`] when the pool cannot be built, which
    /// includes failing to open the initial idle connections.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let inner = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.idle_floor()))
            .connection_timeout(config.checkout_timeout)
            .build(manager)
            .await
            .map_err(PoolError::setup)?;
        Ok(Self { inner })
    }

    /// Check out one connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Checkout`] when no connection can be served
    /// within the checkout deadline.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner.get().await.map_err(PoolError::checkout)
    }
}
