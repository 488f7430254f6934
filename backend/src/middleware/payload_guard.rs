//! Body guard enforcing the configured size and parameter limits.
//!
//! JSON and urlencoded bodies are buffered once, validated against both
//! limits, then handed back to the route extractors untouched. Other content
//! types pass straight through, mirroring a parser that only registers for
//! those two types. Limit violations answer 413; bodies that fail to parse
//! under their declared type answer 400.

use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::web::BytesMut;
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use futures_util::StreamExt;

use crate::http::error::ApiError;

/// Limits applied to inspected bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Maximum body size in bytes.
    pub bytes: usize,
    /// Maximum number of parameters carried by the body.
    pub parameters: usize,
}

/// Content types the guard inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

/// Body-guard middleware. One instance per app, configured from settings.
#[derive(Clone)]
pub struct PayloadGuard {
    limits: PayloadLimits,
}

impl PayloadGuard {
    /// Guard bodies with the given limits.
    pub fn new(limits: PayloadLimits) -> Self {
        Self { limits }
    }
}

impl<S, B> Transform<S, ServiceRequest> for PayloadGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PayloadGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PayloadGuardMiddleware {
            service: Rc::new(service),
            limits: self.limits,
        }))
    }
}

/// Service wrapper produced by [`PayloadGuard`].
pub struct PayloadGuardMiddleware<S> {
    service: Rc<S>,
    limits: PayloadLimits,
}

impl<S, B> Service<ServiceRequest> for PayloadGuardMiddleware<S>
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

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limits = self.limits;

        Box::pin(async move {
            if let Some(kind) = body_kind(&req) {
                if declared_length(&req).is_some_and(|len| len > limits.bytes) {
                    return Err(ApiError::payload_too_large(limits.bytes).into());
                }
                let body = buffer_within_limit(&mut req, limits.bytes).await?;
                if !body.is_empty() {
                    inspect_parameters(&body, kind, limits.parameters)?;
                }
                req.set_payload(reinjected(body));
            }
            service.call(req).await
        })
    }
}

fn body_kind(req: &ServiceRequest) -> Option<BodyKind> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .to_ascii_lowercase();
    if content_type.starts_with("application/json") {
        Some(BodyKind::Json)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else {
        None
    }
}

fn declared_length(req: &ServiceRequest) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Drain the request payload, failing as soon as the byte limit is crossed.
async fn buffer_within_limit(req: &mut ServiceRequest, limit: usize) -> Result<BytesMut, Error> {
    let mut payload = req.take_payload();
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|err| ApiError::malformed_body(err.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(ApiError::payload_too_large(limit).into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn inspect_parameters(body: &[u8], kind: BodyKind, limit: usize) -> Result<(), Error> {
    let count = match kind {
        BodyKind::Json => {
            let value: serde_json::Value = serde_json::from_slice(body)
                .map_err(|err| ApiError::malformed_body(err.to_string()))?;
            count_json_parameters(&value)
        }
        BodyKind::Form => {
            let text = std::str::from_utf8(body)
                .map_err(|err| ApiError::malformed_body(err.to_string()))?;
            count_form_parameters(text)
        }
    };
    if count > limit {
        return Err(ApiError::too_many_parameters(limit).into());
    }
    Ok(())
}

/// Count every object entry, at any depth. Scalars and array positions are
/// free; only keyed entries consume the budget.
fn count_json_parameters(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => {
            map.len() + map.values().map(count_json_parameters).sum::<usize>()
        }
        serde_json::Value::Array(items) => items.iter().map(count_json_parameters).sum(),
        _ => 0,
    }
}

fn count_form_parameters(text: &str) -> usize {
    text.split('&').filter(|pair| !pair.is_empty()).count()
}

/// Hand the buffered bytes back to the request so extractors see the body.
fn reinjected(body: BytesMut) -> dev::Payload {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body.freeze());
    dev::Payload::from(payload)
}
