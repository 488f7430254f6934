//! Error funnel: logs request failures and forwards them to crash reporting.
//!
//! Sits directly inside the access log so it observes the final outcome of
//! every stage below it, whether the failure surfaced as a service error or
//! as an error response built by a handler.

use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::error;

use crate::domain::ports::{CrashReport, FaultEvent};

/// Error-funnel middleware holding the crash-report port.
#[derive(Clone)]
pub struct Report {
    reporter: Arc<dyn CrashReport>,
}

impl Report {
    /// Wrap the given reporter. The reporter decides what leaves the process.
    pub fn new(reporter: Arc<dyn CrashReport>) -> Self {
        Self { reporter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Report
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ReportMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ReportMiddleware {
            service,
            reporter: Arc::clone(&self.reporter),
        }))
    }
}

/// Service wrapper produced by [`Report`].
pub struct ReportMiddleware<S> {
    service: S,
    reporter: Arc<dyn CrashReport>,
}

impl<S, B> Service<ServiceRequest> for ReportMiddleware<S>
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
        let endpoint = format!("{} {}", req.method(), req.path());
        let reporter = Arc::clone(&self.reporter);
        let fut = self.service.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    if let Some(err) = res.response().error() {
                        let event =
                            FaultEvent::new(&endpoint, res.status().as_u16(), err.to_string());
                        error!(%endpoint, status = event.status, error = %event.message, "request failed");
                        reporter.capture(&event);
                    } else if res.status().is_server_error() {
                        let event = FaultEvent::new(
                            &endpoint,
                            res.status().as_u16(),
                            "unhandled server error",
                        );
                        error!(%endpoint, status = event.status, "request failed without an attached error");
                        reporter.capture(&event);
                    }
                    Ok(res)
                }
                Err(err) => {
                    let status = err.as_response_error().status_code();
                    let event = FaultEvent::new(&endpoint, status.as_u16(), err.to_string());
                    error!(%endpoint, status = event.status, error = %event.message, "request aborted");
                    reporter.capture(&event);
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use actix_web::http::StatusCode;
    use actix_web::{test, web, App, HttpResponse};

    use super::*;
    use crate::http::error::ApiError;

    #[derive(Default)]
    struct RecordingReport {
        events: Mutex<Vec<FaultEvent>>,
    }

    impl CrashReport for RecordingReport {
        fn capture(&self, event: &FaultEvent) {
            self.events.lock().expect("events lock").push(event.clone());
        }
    }

    fn recorded(reporter: &RecordingReport) -> Vec<FaultEvent> {
        reporter.events.lock().expect("events lock").clone()
    }

    #[actix_web::test]
    async fn successful_requests_are_not_reported() {
        let reporter = Arc::new(RecordingReport::default());
        let app = test::init_service(
            App::new()
                .wrap(Report::new(reporter.clone()))
                .route("/ok", web::get().to(HttpResponse::Ok)),
        )
        .await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(recorded(&reporter).is_empty());
    }

    #[actix_web::test]
    async fn handler_failures_reach_the_reporter() {
        async fn failing() -> Result<HttpResponse, ApiError> {
            Err(ApiError::internal("database on fire"))
        }
        let reporter = Arc::new(RecordingReport::default());
        let app = test::init_service(
            App::new()
                .wrap(Report::new(reporter.clone()))
                .route("/fail", web::get().to(failing)),
        )
        .await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/fail").to_request()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let events = recorded(&reporter);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].endpoint, "GET /fail");
        assert_eq!(events[0].status, 500);
    }

    #[actix_web::test]
    async fn plain_client_errors_are_not_reported() {
        let reporter = Arc::new(RecordingReport::default());
        let app = test::init_service(
            App::new()
                .wrap(Report::new(reporter.clone()))
                .route("/ok", web::get().to(HttpResponse::Ok)),
        )
        .await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/missing").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(recorded(&reporter).is_empty());
    }
}
