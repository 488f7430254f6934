//! Migration-currency check backed by embedded Diesel migrations.
//!
//! The check runs over a plain synchronous connection on a blocking thread;
//! it happens once at boot, before the async pool exists.

use async_trait::async_trait;
use diesel::migration::Migration;
use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::domain::ports::{SchemaGuard, SchemaGuardError};

/// Migrations compiled into the binary from `migrations/`.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Guard comparing the live schema against the embedded migration set.
pub struct DieselSchemaGuard {
    database_url: String,
}

impl DieselSchemaGuard {
    /// Check against the database at `database_url`.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl SchemaGuard for DieselSchemaGuard {
    async fn check(&self) -> Result<(), SchemaGuardError> {
        let url = self.database_url.clone();
        let outcome = tokio::task::spawn_blocking(move || pending_migration_names(&url)).await;
        match outcome {
            Ok(Ok(names)) if names.is_empty() => Ok(()),
            Ok(Ok(names)) => Err(SchemaGuardError::pending(names.join(", "))),
            Ok(Err(err)) => Err(err),
            Err(err) => Err(SchemaGuardError::unavailable(format!(
                "schema check task failed: {err}"
            ))),
        }
    }
}

fn pending_migration_names(database_url: &str) -> Result<Vec<String>, SchemaGuardError> {
    let mut conn = PgConnection::establish(database_url)
        .map_err(|err| SchemaGuardError::unavailable(err.to_string()))?;
    let pending = conn
        .pending_migrations(MIGRATIONS)
        .map_err(|err| SchemaGuardError::unavailable(err.to_string()))?;
    Ok(pending
        .iter()
        .map(|migration| migration.name().to_string())
        .collect())
}
