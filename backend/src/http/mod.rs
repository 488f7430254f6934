//! HTTP adapter: error envelope, probes, and the business route set.

pub mod error;
pub mod health;
pub mod routes;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use health::HealthState;
pub use routes::{AppRoutes, RequestStages, RouteRegistrar};
