//! Attaches the per-request [`ViewContext`] snapshot.
//!
//! Runs inside the lookup refresh, so the snapshot it takes already reflects
//! this request's directory fetch. Handlers and templates read the context
//! through the [`ViewContext`] extractor rather than touching shared state.

use std::task::{Context, Poll};

use actix_session::SessionExt;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::locals::{AppLocals, AssociationCache, ViewContext};
use crate::middleware::session_tag::SESSION_ID_KEY;

/// View-locals middleware bound to the app identity and the lookup cache.
#[derive(Clone)]
pub struct ViewLocals {
    locals: AppLocals,
    cache: AssociationCache,
}

impl ViewLocals {
    /// Snapshot `locals` and `cache` into each wrapped request.
    pub fn new(locals: AppLocals, cache: AssociationCache) -> Self {
        Self { locals, cache }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ViewLocals
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ViewLocalsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ViewLocalsMiddleware {
            service,
            locals: self.locals.clone(),
            cache: self.cache.clone(),
        }))
    }
}

/// Service wrapper produced by [`ViewLocals`].
pub struct ViewLocalsMiddleware<S> {
    service: S,
    locals: AppLocals,
    cache: AssociationCache,
}

impl<S, B> Service<ServiceRequest> for ViewLocalsMiddleware<S>
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
        let session_id = req
            .get_session()
            .get::<String>(SESSION_ID_KEY)
            .ok()
            .flatten();
        let context = ViewContext {
            title: self.locals.title.clone(),
            session_id,
            associations: self.cache.snapshot(),
        };
        req.extensions_mut().insert(context);
        let fut = self.service.call(req);
        Box::pin(fut)
    }
}
