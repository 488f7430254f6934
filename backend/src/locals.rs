//! Shared presentation state and its per-request snapshot.
//!
//! Two lifetimes live here. [`AppLocals`] is fixed at boot and never changes.
//! [`AssociationCache`] is rewritten by the lookup-refresh stage on every
//! business request; readers always see the most recent complete write.
//! [`ViewContext`] is the immutable snapshot of both that the locals stage
//! attaches to each request for handlers and templates.

use std::sync::{Arc, PoisonError, RwLock};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};
use serde::Serialize;

use crate::domain::Association;
use crate::http::error::ApiError;

/// Application identity fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct AppLocals {
    /// Title injected into every rendered view.
    pub title: String,
}

impl Default for AppLocals {
    fn default() -> Self {
        Self {
            title: "Lend Manager".to_string(),
        }
    }
}

/// Last-write-wins cell holding the current association collection.
///
/// Concurrent refreshes race benignly: each writer replaces the whole
/// collection, so readers observe one refresh or the other, never a blend.
#[derive(Debug, Clone, Default)]
pub struct AssociationCache {
    inner: Arc<RwLock<Vec<Association>>>,
}

impl AssociationCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached collection wholesale.
    pub fn replace(&self, records: Vec<Association>) {
        let mut slot = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = records;
    }

    /// Clone out the current collection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Association> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Per-request view of the shared state, attached by the locals stage.
#[derive(Debug, Clone, Serialize)]
pub struct ViewContext {
    /// Application title.
    pub title: String,
    /// Identifier tagged onto the caller's session, when one exists.
    pub session_id: Option<String>,
    /// Association collection as of this request's refresh.
    pub associations: Vec<Association>,
}

impl FromRequest for ViewContext {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<ViewContext>()
                .cloned()
                .ok_or_else(|| ApiError::internal("view context not attached to this route")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_overwrites_rather_than_merges() {
        let cache = AssociationCache::new();
        cache.replace(vec![
            Association::new(1, "First"),
            Association::new(2, "Second"),
        ]);
        cache.replace(vec![Association::new(3, "Third")]);
        assert_eq!(cache.snapshot(), vec![Association::new(3, "Third")]);
    }

    #[test]
    fn snapshot_of_a_fresh_cache_is_empty() {
        assert!(AssociationCache::new().snapshot().is_empty());
    }

    #[test]
    fn snapshots_are_independent_of_later_writes() {
        let cache = AssociationCache::new();
        cache.replace(vec![Association::new(1, "First")]);
        let before = cache.snapshot();
        cache.replace(vec![]);
        assert_eq!(before.len(), 1);
    }
}
