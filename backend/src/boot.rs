//! Ordered, fail-fast startup sequence.
//!
//! Startup is an explicit list of named steps run by one executor: migration
//! check, data mapper init, lookup stage registration, route registration,
//! error reporting install, listen. The first failure halts the sequence and
//! [`StartupError`] records which step refused to come up. Testing mode skips
//! the migration check so suites can boot without a migrated database.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::web;
use futures_util::future::LocalBoxFuture;
use sentry::ClientInitGuard;
use tracing::debug;

use crate::domain::ports::{
    AssociationDirectory, CrashReport, DataMapper, DataMapperError, SchemaGuard, SchemaGuardError,
};
use crate::http::routes::RouteRegistrar;
use crate::http::HealthState;
use crate::server::{PipelineBuilder, PipelineError};
use crate::settings::Settings;
use crate::telemetry;

const MIGRATION_CHECK: &str = "migration check";
const DATA_MAPPER_INIT: &str = "data mapper init";
const LOOKUP_STAGE: &str = "lookup stage registration";
const ROUTE_REGISTRATION: &str = "route registration";
const ERROR_REPORTING: &str = "error reporting install";
const LISTEN: &str = "listen";

/// Failure inside a single boot step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The schema guard found pending migrations or no reachable database.
    #[error(transparent)]
    Migration(#[from] SchemaGuardError),
    /// The data-mapping layer could not be bound.
    #[error(transparent)]
    DataLayer(#[from] DataMapperError),
    /// The pipeline builder could not be assembled.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The listener could not bind its address.
    #[error("failed to bind the listener: {0}")]
    Bind(#[from] std::io::Error),
    /// A step needed state that a prior step never produced.
    #[error("boot step dependency missing: {0}")]
    Dependency(&'static str),
}

/// Startup failure naming the step that halted the sequence.
#[derive(Debug, thiserror::Error)]
#[error("startup halted at `{step}`: {source}")]
pub struct StartupError {
    step: &'static str,
    #[source]
    source: StepError,
}

impl StartupError {
    /// Name of the step that failed.
    pub fn step(&self) -> &'static str {
        self.step
    }
}

type StepFuture = LocalBoxFuture<'static, Result<(), StepError>>;

struct BootStep {
    name: &'static str,
    skip_in_testing: bool,
    action: Box<dyn FnOnce() -> StepFuture>,
}

/// Ordered list of named steps, run first to last.
struct BootPlan {
    steps: Vec<BootStep>,
}

impl BootPlan {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn step(self, name: &'static str, action: impl FnOnce() -> StepFuture + 'static) -> Self {
        self.push(name, false, action)
    }

    fn step_unless_testing(
        self,
        name: &'static str,
        action: impl FnOnce() -> StepFuture + 'static,
    ) -> Self {
        self.push(name, true, action)
    }

    fn push(
        mut self,
        name: &'static str,
        skip_in_testing: bool,
        action: impl FnOnce() -> StepFuture + 'static,
    ) -> Self {
        self.steps.push(BootStep {
            name,
            skip_in_testing,
            action: Box::new(action),
        });
        self
    }

    async fn run(self, testing: bool) -> Result<(), StartupError> {
        for step in self.steps {
            if testing && step.skip_in_testing {
                debug!(step = step.name, "boot step skipped in testing mode");
                continue;
            }
            debug!(step = step.name, "boot step starting");
            (step.action)()
                .await
                .map_err(|source| StartupError {
                    step: step.name,
                    source,
                })?;
        }
        Ok(())
    }
}

/// Subsystems the boot sequence brings up, each behind its port.
pub struct Collaborators {
    /// Checked first: refuses to start on pending migrations.
    pub schema_guard: Arc<dyn SchemaGuard>,
    /// Bound second: the data-mapping layer behind the lookup directory.
    pub data_mapper: Arc<dyn DataMapper>,
    /// Feeds the per-request lookup refresh stage.
    pub directory: Arc<dyn AssociationDirectory>,
    /// Mounts the business routes.
    pub routes: Arc<dyn RouteRegistrar>,
    /// Receives qualifying faults from the error funnel.
    pub reporter: Arc<dyn CrashReport>,
}

/// A successfully started process: the bound server plus the crash-reporter
/// guard, which must live as long as the process.
pub struct Running {
    server: Server,
    health: web::Data<HealthState>,
    crash_guard: Option<ClientInitGuard>,
}

// The server future and crash-reporter guard expose no `Debug` of their own.
impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running").finish_non_exhaustive()
    }
}

impl Running {
    /// Handle for requesting shutdown while [`Running::serve`] is in flight.
    pub fn handle(&self) -> actix_web::dev::ServerHandle {
        self.server.handle()
    }

    /// Drive the server to completion, then flush the crash reporter.
    ///
    /// Once the listener winds down the probes report draining, so any
    /// remaining checks see the process on its way out.
    ///
    /// # Errors
    ///
    /// Forwards the server's I/O error when it stops abnormally.
    pub async fn serve(self) -> std::io::Result<()> {
        let Self {
            server,
            health,
            crash_guard,
        } = self;
        let result = server.await;
        health.mark_draining();
        drop(crash_guard);
        result
    }
}

/// Run the startup sequence and return the bound, ready-marked server.
///
/// Steps run strictly in order and the sequence halts on the first failure;
/// nothing started by earlier steps is unwound. In testing mode the migration
/// check is skipped and the remaining steps run unchanged.
///
/// # Errors
///
/// Returns [`StartupError`] naming the first step that failed.
pub async fn boot(
    settings: Settings,
    collaborators: Collaborators,
) -> Result<Running, StartupError> {
    let testing = settings.testing;
    let builder_slot: Rc<RefCell<Option<PipelineBuilder>>> = Rc::new(RefCell::new(None));
    let server_slot: Rc<RefCell<Option<Server>>> = Rc::new(RefCell::new(None));
    let guard_slot: Rc<RefCell<Option<ClientInitGuard>>> = Rc::new(RefCell::new(None));

    let plan = BootPlan::new()
        .step_unless_testing(MIGRATION_CHECK, {
            let guard = Arc::clone(&collaborators.schema_guard);
            move || Box::pin(async move { guard.check().await.map_err(StepError::from) })
        })
        .step(DATA_MAPPER_INIT, {
            let mapper = Arc::clone(&collaborators.data_mapper);
            move || Box::pin(async move { mapper.bind().await.map_err(StepError::from) })
        })
        .step(LOOKUP_STAGE, {
            let builder_slot = Rc::clone(&builder_slot);
            let directory = Arc::clone(&collaborators.directory);
            let settings = settings.clone();
            move || {
                Box::pin(async move {
                    let mut builder = PipelineBuilder::new(settings)?;
                    builder.with_lookup(directory);
                    builder_slot.borrow_mut().replace(builder);
                    Ok(())
                })
            }
        })
        .step(ROUTE_REGISTRATION, {
            let builder_slot = Rc::clone(&builder_slot);
            let routes = Arc::clone(&collaborators.routes);
            move || {
                Box::pin(async move {
                    builder_slot
                        .borrow_mut()
                        .as_mut()
                        .ok_or(StepError::Dependency("pipeline builder"))?
                        .with_routes(routes);
                    Ok(())
                })
            }
        })
        .step(ERROR_REPORTING, {
            let builder_slot = Rc::clone(&builder_slot);
            let guard_slot = Rc::clone(&guard_slot);
            let reporter = Arc::clone(&collaborators.reporter);
            let settings = settings.clone();
            move || {
                Box::pin(async move {
                    *guard_slot.borrow_mut() = telemetry::init_crash_reporter(&settings);
                    builder_slot
                        .borrow_mut()
                        .as_mut()
                        .ok_or(StepError::Dependency("pipeline builder"))?
                        .with_reporting(reporter);
                    Ok(())
                })
            }
        })
        .step(LISTEN, {
            let builder_slot = Rc::clone(&builder_slot);
            let server_slot = Rc::clone(&server_slot);
            move || {
                Box::pin(async move {
                    let server = {
                        let slot = builder_slot.borrow();
                        slot.as_ref()
                            .ok_or(StepError::Dependency("pipeline builder"))?
                            .bind()?
                    };
                    server_slot.borrow_mut().replace(server);
                    Ok(())
                })
            }
        });

    plan.run(testing).await?;

    let server = server_slot.borrow_mut().take().ok_or(StartupError {
        step: LISTEN,
        source: StepError::Dependency("server handle"),
    })?;
    let health = builder_slot
        .borrow()
        .as_ref()
        .map(PipelineBuilder::health)
        .ok_or(StartupError {
            step: LISTEN,
            source: StepError::Dependency("pipeline builder"),
        })?;
    Ok(Running {
        server,
        health,
        crash_guard: guard_slot.borrow_mut().take(),
    })
}
