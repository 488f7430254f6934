//! Access logging middleware emitting one event per completed request.
//!
//! Runs outermost so every request that reaches the server is logged with its
//! final status, including static-asset hits and requests the guard stages
//! reject. The pipeline builder disables it wholesale in testing mode.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use chrono::Utc;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::info;

/// Access-log middleware. Stateless; wrap it once around the whole app.
#[derive(Clone)]
pub struct AccessLog;

impl<S, B> Transform<S, ServiceRequest> for AccessLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessLogMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessLogMiddleware { service }))
    }
}

/// Service wrapper produced by [`AccessLog`].
pub struct AccessLogMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AccessLogMiddleware<S>
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
        let remote = req
            .connection_info()
            .realip_remote_addr()
            .map_or_else(|| "-".to_string(), str::to_owned);
        let method = req.method().to_string();
        let url = req.uri().to_string();
        let fut = self.service.call(req);

        Box::pin(async move {
            let ts = Utc::now().format("%d/%b/%Y:%H:%M:%S %z").to_string();
            let outcome = fut.await;
            match &outcome {
                Ok(res) => {
                    info!(
                        target: "access",
                        %ts,
                        %remote,
                        %method,
                        %url,
                        params = %rendered_params(res),
                        status = res.status().as_u16(),
                        "request completed"
                    );
                }
                Err(err) => {
                    info!(
                        target: "access",
                        %ts,
                        %remote,
                        %method,
                        %url,
                        params = "-",
                        status = err.as_response_error().status_code().as_u16(),
                        "request completed"
                    );
                }
            }
            outcome
        })
    }
}

/// Render matched path parameters as `name=value` pairs, or `-` when none.
fn rendered_params<B>(res: &ServiceResponse<B>) -> String {
    let info = res.request().match_info();
    if info.iter().next().is_none() {
        return "-".to_string();
    }
    info.iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}
