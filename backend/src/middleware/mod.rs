//! Request middleware.
//!
//! One stage per file. The pipeline builder in `server` decides ordering;
//! nothing here registers itself.

pub mod access_log;
pub mod lookup_refresh;
pub mod payload_guard;
pub mod report;
pub mod session_tag;
pub mod view_locals;

pub use access_log::AccessLog;
pub use lookup_refresh::LookupRefresh;
pub use payload_guard::{PayloadGuard, PayloadLimits};
pub use report::Report;
pub use session_tag::{SessionTag, SESSION_ID_KEY};
pub use view_locals::ViewLocals;
