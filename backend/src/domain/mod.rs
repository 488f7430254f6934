//! Domain records and the ports the orchestrator drives.
//!
//! Types here stay transport-free: nothing in this module knows about HTTP,
//! cookies, or templates. Adapters under `persistence` and `telemetry`
//! implement the ports; the boot sequence wires them together.

pub mod association;
pub mod ports;

pub use association::Association;
