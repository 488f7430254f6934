//! Lend Manager backend: ordered startup plus the request pipeline.
//!
//! [`boot`] brings the subsystems up in a fixed, fail-fast order and
//! [`server::PipelineBuilder`] assembles the middleware chain every request
//! passes through. Domain ports in [`domain::ports`] keep the orchestration
//! testable without a database or a crash-reporting account.

pub mod boot;
pub mod domain;
pub mod http;
pub mod locals;
pub mod middleware;
pub mod persistence;
pub mod server;
pub mod settings;
pub mod telemetry;

pub use boot::{boot, Collaborators, Running, StartupError};
pub use server::PipelineBuilder;
pub use settings::{settings_from_env, BuildMode, Settings};
