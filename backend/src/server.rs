//! Pipeline builder: one place that knows the middleware onion.
//!
//! The boot sequence configures a [`PipelineBuilder`] step by step, then
//! calls [`PipelineBuilder::bind`] to open the listener. Each worker gets an
//! identical app from [`PipelineBuilder::build_app`].
//!
//! Stage order, outermost first: access log (disabled in testing mode),
//! error funnel, payload guard, session cookie, session tag. Static trees
//! and probes are plain services; business routes run behind the
//! [`RequestStages`] pair so only they pay for lookup refreshes.

use std::sync::Arc;

use actix_files::Files;
use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::body::{BoxBody, EitherBody};
use actix_web::cookie::SameSite;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::Condition;
use actix_web::{web, App, Error, HttpServer};
use tera::Tera;
use tracing::info;

use crate::domain::ports::{AssociationDirectory, CrashReport, NoopCrashReport};
use crate::http::health::{self, HealthState};
use crate::http::routes::{RequestStages, RouteRegistrar};
use crate::locals::{AppLocals, AssociationCache};
use crate::middleware::{AccessLog, LookupRefresh, PayloadGuard, PayloadLimits, Report, SessionTag, ViewLocals};
use crate::settings::Settings;

/// Failure while assembling the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The view engine could not load the configured template glob.
    #[error("view engine failed to load templates: {0}")]
    Views(#[from] tera::Error),
}

/// Builder collecting everything the request pipeline needs.
///
/// Collaborators arrive in boot order: the lookup directory with the
/// assembly step, routes with the registration step, the crash reporter with
/// the reporting step. `build_app` tolerates missing collaborators so the
/// builder stays testable piecemeal; production always configures all three
/// before binding.
#[derive(Clone)]
pub struct PipelineBuilder {
    settings: Settings,
    locals: AppLocals,
    cache: AssociationCache,
    engine: web::Data<Tera>,
    health: web::Data<HealthState>,
    directory: Option<Arc<dyn AssociationDirectory>>,
    registrar: Option<Arc<dyn RouteRegistrar>>,
    reporter: Arc<dyn CrashReport>,
}

impl PipelineBuilder {
    /// Assemble the fixed parts of the pipeline.
    ///
    /// Loads the view templates once; workers share the parsed set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Views`] when the template glob fails to load.
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        let engine = Tera::new(&settings.views_glob)?;
        Ok(Self {
            settings,
            locals: AppLocals::default(),
            cache: AssociationCache::new(),
            engine: web::Data::new(engine),
            health: web::Data::new(HealthState::new()),
            directory: None,
            registrar: None,
            reporter: Arc::new(NoopCrashReport),
        })
    }

    /// Install the lookup directory feeding the refresh stage.
    pub fn with_lookup(&mut self, directory: Arc<dyn AssociationDirectory>) {
        self.directory = Some(directory);
    }

    /// Install the registrar that mounts business routes.
    pub fn with_routes(&mut self, registrar: Arc<dyn RouteRegistrar>) {
        self.registrar = Some(registrar);
    }

    /// Install the crash reporter fed by the error funnel.
    pub fn with_reporting(&mut self, reporter: Arc<dyn CrashReport>) {
        self.reporter = reporter;
    }

    /// Shared health state, flipped ready once the listener is bound.
    pub fn health(&self) -> web::Data<HealthState> {
        self.health.clone()
    }

    fn request_stages(&self) -> Option<RequestStages> {
        let directory = self.directory.as_ref()?;
        Some(RequestStages {
            lookup: LookupRefresh::new(Arc::clone(directory), self.cache.clone()),
            locals: ViewLocals::new(self.locals.clone(), self.cache.clone()),
        })
    }

    fn session_layer(&self) -> SessionMiddleware<CookieSessionStore> {
        let secure =
            self.settings.environment != "development" && !self.settings.testing;
        SessionMiddleware::builder(
            CookieSessionStore::default(),
            self.settings.session_key.clone(),
        )
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(secure)
        .cookie_http_only(true)
        .cookie_same_site(SameSite::Lax)
        .build()
    }

    /// Build one worker's app with the full stage order.
    pub fn build_app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<EitherBody<BoxBody>>,
            Error = Error,
            InitError = (),
        > + use<>,
    > {
        let limits = PayloadLimits {
            bytes: self.settings.body_size_limit,
            parameters: self.settings.parameter_limit,
        };
        let stages = self.request_stages();
        let registrar = self.registrar.clone();

        App::new()
            .app_data(self.engine.clone())
            .app_data(self.health.clone())
            .app_data(web::JsonConfig::default().limit(limits.bytes))
            .app_data(web::FormConfig::default().limit(limits.bytes))
            .app_data(web::PayloadConfig::new(limits.bytes))
            .configure(move |cfg| {
                if let (Some(stages), Some(registrar)) = (stages.as_ref(), registrar.as_ref()) {
                    registrar.register(cfg, stages);
                }
            })
            .service(health::ready)
            .service(health::live)
            .service(Files::new("/docs", self.settings.docs_dir.clone()).index_file("index.html"))
            .service(Files::new("/", self.settings.public_dir.clone()))
            .wrap(SessionTag)
            .wrap(self.session_layer())
            .wrap(PayloadGuard::new(limits))
            .wrap(Report::new(Arc::clone(&self.reporter)))
            .wrap(Condition::new(!self.settings.testing, AccessLog))
    }

    /// Bind the listener and hand back the running server future.
    ///
    /// Marks the health state ready once the socket is open.
    ///
    /// # Errors
    ///
    /// Returns the bind error when the address is unavailable.
    pub fn bind(&self) -> std::io::Result<Server> {
        let factory = self.clone();
        let http_server = HttpServer::new(move || factory.build_app())
            .bind(("0.0.0.0", self.settings.port))?;
        let addrs = http_server.addrs();
        let server = http_server.run();
        self.health.mark_ready();
        info!(?addrs, "listening");
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::cookie::Key;
    use actix_web::http::StatusCode;
    use actix_web::test;

    use super::*;
    use crate::domain::ports::FixtureAssociationDirectory;
    use crate::http::routes::AppRoutes;

    fn test_settings(root: &std::path::Path) -> Settings {
        Settings {
            port: 0,
            body_size_limit: 1024,
            parameter_limit: 8,
            environment: "development".to_string(),
            testing: true,
            crash_token: None,
            crash_environment: None,
            session_key: Key::generate(),
            database_url: None,
            db_pool_size: 2,
            db_pool_timeout: std::time::Duration::from_secs(1),
            views_glob: format!("{}/views/**/*.html", root.display()),
            docs_dir: root.join("docs"),
            public_dir: root.join("public"),
        }
    }

    fn scaffold() -> (tempfile::TempDir, PipelineBuilder) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("views")).expect("views dir");
        std::fs::create_dir_all(dir.path().join("docs")).expect("docs dir");
        std::fs::create_dir_all(dir.path().join("public")).expect("public dir");
        std::fs::write(
            dir.path().join("views/index.html"),
            "<h1>{{ title }}</h1>{% for a in associations %}<p>{{ a.name }}</p>{% endfor %}",
        )
        .expect("template");
        let builder = PipelineBuilder::new(test_settings(dir.path())).expect("builder");
        (dir, builder)
    }

    #[actix_web::test]
    async fn unmatched_paths_fall_through_to_public_assets() {
        let (dir, builder) = scaffold();
        std::fs::write(dir.path().join("public/styles.css"), "body{}").expect("asset");
        let app = test::init_service(builder.build_app()).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/styles.css").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/nothing").to_request()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn docs_tree_is_served_with_an_index() {
        let (dir, builder) = scaffold();
        std::fs::write(dir.path().join("docs/index.html"), "<p>manual</p>").expect("docs index");
        let app = test::init_service(builder.build_app()).await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/docs/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn fully_configured_builder_serves_the_home_view() {
        let (_dir, mut builder) = scaffold();
        builder.with_lookup(Arc::new(FixtureAssociationDirectory));
        builder.with_routes(Arc::new(AppRoutes));
        let app = test::init_service(builder.build_app()).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        let html = std::str::from_utf8(&body).expect("utf8");
        assert!(html.contains("Tool Library"));
    }

    #[actix_web::test]
    async fn probes_answer_outside_the_business_stages() {
        let (_dir, builder) = scaffold();
        let app = test::init_service(builder.build_app()).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/live").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        // Readiness stays down until bind() flips it.
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
