//! Logging and crash-reporting initialisation.

use sentry::types::Dsn;
use sentry::ClientInitGuard;
use tracing::{info, warn};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::domain::ports::{CrashReport, FaultEvent};
use crate::settings::Settings;

/// Install the global JSON tracing subscriber.
///
/// Filtering follows `RUST_LOG`. A second call logs a warning instead of
/// panicking so tests can initialise freely.
pub fn init_logging() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed; continuing with existing subscriber");
    }
}

/// Start the crash-reporting client when a DSN token is configured.
///
/// Returns the guard that keeps the transport alive; dropping it flushes
/// pending events. A missing token leaves reporting dormant, and a malformed
/// token is logged and ignored rather than aborting startup.
pub fn init_crash_reporter(settings: &Settings) -> Option<ClientInitGuard> {
    let token = settings.crash_token.as_deref()?;
    let dsn = match token.parse::<Dsn>() {
        Ok(dsn) => dsn,
        Err(e) => {
            warn!(error = %e, "crash reporting disabled: token is not a valid DSN");
            return None;
        }
    };
    let environment = settings
        .crash_environment
        .clone()
        .unwrap_or_else(|| settings.environment.clone());
    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        environment: Some(environment.clone().into()),
        release: sentry::release_name!(),
        ..Default::default()
    });
    info!(%environment, "crash reporting enabled");
    Some(guard)
}

/// Crash reporter that forwards fault events to the sentry client.
///
/// Safe to install even when [`init_crash_reporter`] returned `None`; the
/// SDK drops events captured without an initialised client.
pub struct SentryCrashReport;

impl CrashReport for SentryCrashReport {
    fn capture(&self, event: &FaultEvent) {
        let mut report = sentry::protocol::Event {
            message: Some(event.message.clone()),
            level: sentry::Level::Error,
            ..Default::default()
        };
        report
            .tags
            .insert("endpoint".to_owned(), event.endpoint.clone());
        report.tags.insert("status".to_owned(), event.status.to_string());
        sentry::capture_event(report);
    }
}
