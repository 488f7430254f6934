//! Health endpoints: liveness and readiness probes for orchestration.
//!
//! Probes sit outside the business stages so they keep answering while the
//! lookup directory is degraded.

use std::sync::atomic::{AtomicU8, Ordering};

use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpResponse, HttpResponseBuilder};

#[repr(u8)]
enum Phase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
}

/// Shared lifecycle phase read by the probe handlers.
///
/// The process starts in the starting phase, enters serving once the boot
/// sequence binds the listener, and moves to draining at shutdown. Draining
/// fails both probes so orchestrators stop routing and recycle the process.
pub struct HealthState {
    phase: AtomicU8,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }
}

impl HealthState {
    /// Start in the starting phase: live, not yet ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the serving phase. Called once the listener is bound.
    pub fn mark_ready(&self) {
        self.phase.store(Phase::Serving as u8, Ordering::Release);
    }

    /// Enter the draining phase.
    pub fn mark_draining(&self) {
        self.phase.store(Phase::Draining as u8, Ordering::Release);
    }

    /// Whether traffic can be routed here.
    pub fn is_ready(&self) -> bool {
        self.phase.load(Ordering::Acquire) == Phase::Serving as u8
    }

    /// Whether the process should stay scheduled.
    pub fn is_alive(&self) -> bool {
        self.phase.load(Ordering::Acquire) != Phase::Draining as u8
    }
}

fn probe(ok: bool) -> HttpResponse {
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    HttpResponseBuilder::new(status)
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// Readiness probe: 200 only while the service is in the serving phase.
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    probe(state.is_ready())
}

/// Liveness probe: 200 until the service starts draining.
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    probe(state.is_alive())
}
