//! Business routes and the registration contract the boot sequence drives.
//!
//! The pipeline builder owns stage construction and ordering; a
//! [`RouteRegistrar`] owns paths and handlers. Registrars mount every
//! business route behind the [`RequestStages`] pair so lookup refresh and
//! view locals run for dynamic requests only, never for static assets or
//! probes.

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use tera::Tera;

use crate::domain::Association;
use crate::http::error::{ApiError, ApiResult};
use crate::locals::ViewContext;
use crate::middleware::{LookupRefresh, ViewLocals};

/// The per-request stages every business route runs behind, built once by
/// the pipeline builder.
#[derive(Clone)]
pub struct RequestStages {
    /// Refreshes the association cache before the route runs.
    pub lookup: LookupRefresh,
    /// Attaches the [`ViewContext`] snapshot after the refresh.
    pub locals: ViewLocals,
}

/// Port through which the boot sequence mounts business routes.
pub trait RouteRegistrar: Send + Sync {
    /// Attach routes to the service configuration, wrapped in `stages`.
    fn register(&self, cfg: &mut web::ServiceConfig, stages: &RequestStages);
}

/// The production route set.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppRoutes;

impl RouteRegistrar for AppRoutes {
    fn register(&self, cfg: &mut web::ServiceConfig, stages: &RequestStages) {
        cfg.service(
            web::resource("/")
                .route(web::get().to(home))
                .wrap(stages.locals.clone())
                .wrap(stages.lookup.clone()),
        );
        cfg.service(
            web::resource("/api/associations")
                .route(web::get().to(list_associations))
                .wrap(stages.locals.clone())
                .wrap(stages.lookup.clone()),
        );
    }
}

/// Landing page: renders the index view with the current lookup snapshot.
pub async fn home(context: ViewContext, engine: web::Data<Tera>) -> ApiResult<HttpResponse> {
    let mut view = tera::Context::new();
    view.insert("title", &context.title);
    view.insert("session_id", &context.session_id);
    view.insert("associations", &context.associations);
    let html = engine
        .render("index.html", &view)
        .map_err(|err| ApiError::internal(format!("render index.html: {err}")))?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(html))
}

/// Current association collection as JSON.
pub async fn list_associations(context: ViewContext) -> web::Json<Vec<Association>> {
    web::Json(context.associations)
}
