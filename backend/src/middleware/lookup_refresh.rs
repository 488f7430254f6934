//! Per-request refresh of the shared association cache.
//!
//! Wrapped around business routes only, so static assets and probes never
//! trigger a directory round trip. The refresh is always on: every request
//! pays for a fetch and the cache is overwritten wholesale. A failed fetch
//! aborts the request instead of serving stale records.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::warn;

use crate::domain::ports::AssociationDirectory;
use crate::http::error::ApiError;
use crate::locals::AssociationCache;

/// Lookup-refresh middleware bound to one directory and one cache.
#[derive(Clone)]
pub struct LookupRefresh {
    directory: Arc<dyn AssociationDirectory>,
    cache: AssociationCache,
}

impl LookupRefresh {
    /// Refresh `cache` from `directory` before each wrapped request.
    pub fn new(directory: Arc<dyn AssociationDirectory>, cache: AssociationCache) -> Self {
        Self { directory, cache }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LookupRefresh
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LookupRefreshMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LookupRefreshMiddleware {
            service: Rc::new(service),
            directory: Arc::clone(&self.directory),
            cache: self.cache.clone(),
        }))
    }
}

/// Service wrapper produced by [`LookupRefresh`].
pub struct LookupRefreshMiddleware<S> {
    service: Rc<S>,
    directory: Arc<dyn AssociationDirectory>,
    cache: AssociationCache,
}

impl<S, B> Service<ServiceRequest> for LookupRefreshMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let directory = Arc::clone(&self.directory);
        let cache = self.cache.clone();

        Box::pin(async move {
            match directory.fetch_all().await {
                Ok(records) => cache.replace(records),
                Err(err) => {
                    warn!(error = %err, "association refresh failed");
                    return Err(ApiError::from(err).into());
                }
            }
            service.call(req).await
        })
    }
}
