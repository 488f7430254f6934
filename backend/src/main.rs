//! Backend entry-point: configuration, collaborator wiring, and boot.

use std::sync::Arc;

use mockable::DefaultEnv;
use tracing::{error, warn};

use lend_manager::boot::{boot, Collaborators};
use lend_manager::domain::ports::{
    FixtureAssociationDirectory, FixtureDataMapper, FixtureSchemaGuard,
};
use lend_manager::http::AppRoutes;
use lend_manager::persistence::{
    DieselAssociationDirectory, DieselDataMapper, DieselSchemaGuard, PoolConfig,
};
use lend_manager::settings::{settings_from_env, BuildMode, Settings};
use lend_manager::telemetry::{self, SentryCrashReport};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_logging();

    let env = DefaultEnv::new();
    let settings = settings_from_env(&env, BuildMode::from_debug_assertions())
        .map_err(|e| std::io::Error::other(format!("configuration error: {e}")))?;

    let collaborators = wire_collaborators(&settings);
    match boot(settings, collaborators).await {
        Ok(running) => running.serve().await,
        Err(e) => {
            // Stay resident without a listener so the failure shows up in
            // logs and probes instead of a restart loop.
            error!(error = %e, step = e.step(), "startup failed");
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Wire live collaborators when a database is configured, fixtures otherwise.
fn wire_collaborators(settings: &Settings) -> Collaborators {
    let routes = Arc::new(AppRoutes);
    let reporter = Arc::new(SentryCrashReport);
    match settings.database_url.as_deref() {
        Some(url) => {
            let pool_config = PoolConfig::new(url)
                .with_max_connections(settings.db_pool_size)
                .with_checkout_timeout(settings.db_pool_timeout);
            let mapper = Arc::new(DieselDataMapper::new(pool_config));
            Collaborators {
                schema_guard: Arc::new(DieselSchemaGuard::new(url)),
                data_mapper: mapper.clone(),
                directory: Arc::new(DieselAssociationDirectory::new(mapper)),
                routes,
                reporter,
            }
        }
        None => {
            warn!("DATABASE_URL is not set; serving fixture lookup data");
            Collaborators {
                schema_guard: Arc::new(FixtureSchemaGuard),
                data_mapper: Arc::new(FixtureDataMapper),
                directory: Arc::new(FixtureAssociationDirectory),
                routes,
                reporter,
            }
        }
    }
}
