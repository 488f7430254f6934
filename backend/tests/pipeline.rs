//! Full-pipeline behaviour through a fully configured builder: body limits
//! enforced ahead of handlers, eager session tagging, per-request lookup
//! refresh, and the error funnel.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_session::Session;
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::{test, web, HttpResponse};
use async_trait::async_trait;
use tempfile::TempDir;
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

use lend_manager::domain::ports::{AssociationDirectory, CrashReport, DirectoryError, FaultEvent};
use lend_manager::domain::Association;
use lend_manager::http::{ApiError, ErrorCode, RequestStages, RouteRegistrar};
use lend_manager::locals::ViewContext;
use lend_manager::middleware::SESSION_ID_KEY;
use lend_manager::server::PipelineBuilder;
use lend_manager::settings::Settings;

const BYTE_LIMIT: usize = 64;
const PARAMETER_LIMIT: usize = 3;

/// Directory that serves a pre-scripted sequence of fetch outcomes.
struct ScriptedDirectory {
    script: Mutex<Vec<Result<Vec<Association>, DirectoryError>>>,
}

#[async_trait]
impl AssociationDirectory for ScriptedDirectory {
    async fn fetch_all(&self) -> Result<Vec<Association>, DirectoryError> {
        let mut script = self.script.lock().expect("script lock");
        assert!(
            !script.is_empty(),
            "directory called more often than scripted"
        );
        script.remove(0)
    }
}

#[derive(Default)]
struct RecordingReport {
    events: Mutex<Vec<FaultEvent>>,
}

impl CrashReport for RecordingReport {
    fn capture(&self, event: &FaultEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

/// Routes instrumented to prove whether a handler actually ran.
struct SpyRoutes {
    hits: Arc<AtomicUsize>,
}

impl RouteRegistrar for SpyRoutes {
    fn register(&self, cfg: &mut web::ServiceConfig, stages: &RequestStages) {
        let echo_hits = Arc::clone(&self.hits);
        cfg.service(
            web::resource("/echo")
                .route(web::post().to(move |body: web::Bytes| {
                    let echo_hits = Arc::clone(&echo_hits);
                    async move {
                        echo_hits.fetch_add(1, Ordering::SeqCst);
                        HttpResponse::Ok().body(body)
                    }
                }))
                .wrap(stages.locals.clone())
                .wrap(stages.lookup.clone()),
        );
        let list_hits = Arc::clone(&self.hits);
        cfg.service(
            web::resource("/api/associations")
                .route(web::get().to(move |context: ViewContext| {
                    let list_hits = Arc::clone(&list_hits);
                    async move {
                        list_hits.fetch_add(1, Ordering::SeqCst);
                        web::Json(context.associations)
                    }
                }))
                .wrap(stages.locals.clone())
                .wrap(stages.lookup.clone()),
        );
        cfg.service(
            web::resource("/whoami").route(web::get().to(|session: Session| async move {
                let sid = session
                    .get::<String>(SESSION_ID_KEY)
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                HttpResponse::Ok().body(sid)
            })),
        );
    }
}

/// Counts the events the request-logging stage emits.
#[derive(Clone, Default)]
struct AccessEvents {
    seen: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> Layer<S> for AccessEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        if event.metadata().target() == "access" {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct World {
    _dir: TempDir,
    builder: PipelineBuilder,
    hits: Arc<AtomicUsize>,
    reporter: Arc<RecordingReport>,
}

fn test_settings(root: &Path, testing: bool) -> Settings {
    Settings {
        port: 0,
        body_size_limit: BYTE_LIMIT,
        parameter_limit: PARAMETER_LIMIT,
        environment: "development".to_owned(),
        testing,
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

fn world(script: Vec<Result<Vec<Association>, DirectoryError>>) -> World {
    world_with(script, true)
}

fn world_with(script: Vec<Result<Vec<Association>, DirectoryError>>, testing: bool) -> World {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("views")).expect("views dir");
    std::fs::create_dir_all(dir.path().join("docs")).expect("docs dir");
    std::fs::create_dir_all(dir.path().join("public")).expect("public dir");
    std::fs::write(dir.path().join("views/index.html"), "<h1>{{ title }}</h1>")
        .expect("template");

    let mut builder = PipelineBuilder::new(test_settings(dir.path(), testing)).expect("builder");
    let hits = Arc::new(AtomicUsize::new(0));
    let reporter = Arc::new(RecordingReport::default());
    builder.with_lookup(Arc::new(ScriptedDirectory {
        script: Mutex::new(script),
    }));
    builder.with_routes(Arc::new(SpyRoutes {
        hits: Arc::clone(&hits),
    }));
    builder.with_reporting(reporter.clone());
    World {
        _dir: dir,
        builder,
        hits,
        reporter,
    }
}

/// A one-parameter JSON body padded to exactly `len` bytes.
fn json_of_len(len: usize) -> String {
    let shell = r#"{"note":""}"#.len();
    assert!(len >= shell);
    format!(r#"{{"note":"{}"}}"#, "x".repeat(len - shell))
}

fn post_json(uri: &str, body: String) -> actix_http::Request {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request()
}

#[actix_web::test]
async fn bodies_at_the_byte_limit_pass_and_one_over_is_rejected() {
    let world = world(vec![Ok(Vec::new()), Ok(Vec::new())]);
    let app = test::init_service(world.builder.build_app()).await;

    let exact = json_of_len(BYTE_LIMIT);
    let res = test::call_service(&app, post_json("/echo", exact.clone())).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(world.hits.load(Ordering::SeqCst), 1);
    let echoed = test::read_body(res).await;
    assert_eq!(echoed, web::Bytes::from(exact));

    let err = test::try_call_service(&app, post_json("/echo", json_of_len(BYTE_LIMIT + 1)))
        .await
        .expect_err("oversize body must be rejected");
    let api = err.as_error::<ApiError>().expect("pipeline error type");
    assert_eq!(api.code(), ErrorCode::PayloadTooLarge);
    assert_eq!(
        world.hits.load(Ordering::SeqCst),
        1,
        "handler must not see the oversize body"
    );
}

#[actix_web::test]
async fn parameter_counts_at_the_limit_pass_and_one_over_is_rejected() {
    let world = world(vec![Ok(Vec::new()), Ok(Vec::new())]);
    let app = test::init_service(world.builder.build_app()).await;

    let at_limit = r#"{"a":1,"b":2,"c":3}"#.to_owned();
    let res = test::call_service(&app, post_json("/echo", at_limit)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(world.hits.load(Ordering::SeqCst), 1);

    let over_limit = r#"{"a":1,"b":2,"c":3,"d":4}"#.to_owned();
    let err = test::try_call_service(&app, post_json("/echo", over_limit))
        .await
        .expect_err("parameter overflow must be rejected");
    let api = err.as_error::<ApiError>().expect("pipeline error type");
    assert_eq!(api.code(), ErrorCode::TooManyParameters);
    assert_eq!(world.hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn first_contact_receives_a_session_id_that_replays_stably() {
    let world = world(Vec::new());
    let app = test::init_service(world.builder.build_app()).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/whoami").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .response()
        .cookies()
        .find(|c| c.name() == "session")
        .expect("first contact must set the session cookie")
        .into_owned();
    let first_sid = test::read_body(res).await;
    let sid = std::str::from_utf8(&first_sid).expect("utf8 sid");
    uuid::Uuid::parse_str(sid).expect("sid is a uuid");

    let replay = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let res = test::call_service(&app, replay).await;
    let second_sid = test::read_body(res).await;
    assert_eq!(first_sid, second_sid);
}

#[actix_web::test]
async fn every_request_sees_the_directorys_latest_collection() {
    let world = world(vec![
        Ok(vec![Association::new(1, "A")]),
        Ok(Vec::new()),
    ]);
    let app = test::init_service(world.builder.build_app()).await;

    let first: Vec<Association> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/associations").to_request(),
    )
    .await;
    assert_eq!(first, vec![Association::new(1, "A")]);

    let second: Vec<Association> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/associations").to_request(),
    )
    .await;
    assert!(
        second.is_empty(),
        "an empty refresh must replace the previous collection"
    );
}

#[actix_web::test]
async fn directory_failure_routes_to_the_error_funnel_and_skips_the_handler() {
    let world = world(vec![Err(DirectoryError::unavailable("directory offline"))]);
    let app = test::init_service(world.builder.build_app()).await;

    let err = test::try_call_service(
        &app,
        test::TestRequest::get().uri("/api/associations").to_request(),
    )
    .await
    .expect_err("refresh failure must abort the request");

    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(world.hits.load(Ordering::SeqCst), 0);

    let events = world.reporter.events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].endpoint, "GET /api/associations");
    assert_eq!(events[0].status, 502);
}

#[actix_web::test]
async fn request_logging_is_silent_in_testing_mode_and_active_otherwise() {
    let counter = AccessEvents::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let quiet = world_with(Vec::new(), true);
    let app = test::init_service(quiet.builder.build_app()).await;
    let res = test::call_service(&app, test::TestRequest::get().uri("/whoami").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        counter.seen.load(Ordering::SeqCst),
        0,
        "testing mode must not emit request log events"
    );

    let logged = world_with(Vec::new(), false);
    let app = test::init_service(logged.builder.build_app()).await;
    let res = test::call_service(&app, test::TestRequest::get().uri("/whoami").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        counter.seen.load(Ordering::SeqCst),
        1,
        "a served request must emit exactly one request log event"
    );
}
