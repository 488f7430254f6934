//! Lookup records surfaced to templates and handlers.

use serde::{Deserialize, Serialize};

/// A lending organisation, the reference record refreshed on every request.
///
/// The persisted row carries more columns (login, active flag, categories);
/// this is the slice the views consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Stable numeric identifier.
    pub id: i32,
    /// Display name shown by the views.
    pub name: String,
}

impl Association {
    /// Convenience constructor used by adapters and tests.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
