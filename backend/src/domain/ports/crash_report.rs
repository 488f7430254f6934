//! Outbound port for crash reporting.
//!
//! The error-funnel stage forwards every request failure it sees through this
//! port. Whether anything leaves the process is the adapter's concern; the
//! default adapter drops events silently when no reporting token is
//! configured.

/// One reportable request failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultEvent {
    /// Method and path the failure surfaced on, e.g. `GET /api/associations`.
    pub endpoint: String,
    /// HTTP status the error funnel settled on.
    pub status: u16,
    /// Rendered failure message.
    pub message: String,
}

impl FaultEvent {
    /// Assemble an event from its parts.
    pub fn new(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }
}

/// Port receiving qualifying request failures.
pub trait CrashReport: Send + Sync {
    /// Record one failure. Must not block or panic.
    fn capture(&self, event: &FaultEvent);
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCrashReport;

impl CrashReport for NoopCrashReport {
    fn capture(&self, _event: &FaultEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_accepts_events() {
        let reporter = NoopCrashReport;
        reporter.capture(&FaultEvent::new("GET /", 500, "boom"));
    }
}
