//! Eager session tagging: every caller gets a session identifier.
//!
//! Runs just inside the session middleware so the cookie is minted on the
//! very first request, before any handler runs. The identifier persists for
//! the lifetime of the cookie; repeat visitors keep theirs.

use std::task::{Context, Poll};

use actix_session::SessionExt;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use uuid::Uuid;

use crate::http::error::ApiError;

/// Session key the identifier is stored under.
pub const SESSION_ID_KEY: &str = "sid";

/// Session-tagging middleware. Stateless; identifiers live in the session.
#[derive(Clone)]
pub struct SessionTag;

impl<S, B> Transform<S, ServiceRequest> for SessionTag
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionTagMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionTagMiddleware { service }))
    }
}

/// Service wrapper produced by [`SessionTag`].
pub struct SessionTagMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SessionTagMiddleware<S>
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
        let session = req.get_session();
        let fut = self.service.call(req);

        Box::pin(async move {
            // Unreadable stored values are treated as absent and overwritten.
            if session
                .get::<String>(SESSION_ID_KEY)
                .ok()
                .flatten()
                .is_none()
            {
                session
                    .insert(SESSION_ID_KEY, Uuid::new_v4().to_string())
                    .map_err(|err| ApiError::internal(format!("session tag write: {err}")))?;
            }
            fut.await
        })
    }
}
