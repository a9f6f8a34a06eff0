mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;
use tracing::Level;

use cg_management::auth::CredentialVerifier;
use cg_management::config::AppConfig;
use cg_management::feed::BroadcastEventSource;
use cg_management::handlers::Action;
use cg_management::middleware::{CredentialGate, Gate, ValidationGate};
use cg_management::router::dispatch::REQUEST_ID_HEADER;
use cg_management::router::{RouteError, RouteTableBuilder};
use cg_management::services::memory;
use cg_management::state::AppState;
use cg_management::validation::schemas;
use common::{LogCapture, TestApp};

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let app = TestApp::new();

    let res = app.request(Method::GET, "/management/nothing-here", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json["error"], "NOT_FOUND");
    assert!(res.headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn wrong_method_is_405_with_allow_header() {
    let app = TestApp::new();

    let res = app.request(Method::PATCH, "/management/processors", None, None).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers[header::ALLOW], "GET, POST, PUT, DELETE");
    assert_eq!(app.stub.total_calls(), 0);
}

#[tokio::test]
async fn literal_segment_beats_parameter() {
    let app = TestApp::new();
    let token = app.token();

    let res = app
        .request(
            Method::GET,
            "/management/subjects/rectification-requests/archive",
            Some(&token),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK, "{}", res.json);
    assert_eq!(app.stub.calls("subjects.archive"), 1);
    assert_eq!(app.stub.calls("subjects.get_rectification_request"), 0);
}

#[tokio::test]
async fn each_request_invokes_exactly_one_controller_operation() {
    let app = TestApp::new();
    let token = app.token();

    let res = app
        .request(Method::GET, "/management/subjects/0xabc/data", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["subjectId"], "0xabc");
    assert_eq!(app.stub.total_calls(), 1);
}

#[tokio::test]
async fn controller_errors_map_to_typed_responses() {
    let app = TestApp::new();
    let token = app.token();

    let res = app
        .request(
            Method::GET,
            "/management/subjects/rectification-requests/404",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json["error"], "NOT_FOUND");
}

#[tokio::test]
async fn internal_failures_are_masked() {
    let app = TestApp::new();
    let token = app.token();
    app.stub.fail_stats.store(true, Ordering::SeqCst);

    let logs = LogCapture::start();

    let res = app.request(Method::GET, "/management/stats", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json["error"], "INTERNAL_SERVER_ERROR");
    assert!(!res.json.to_string().contains("hunter2"));
    assert!(logs.count(Level::ERROR, "hunter2") >= 1, "{:?}", logs.messages());
}

#[tokio::test]
async fn panicking_handler_becomes_a_500_and_the_app_keeps_serving() {
    let logs = LogCapture::start();
    let app = TestApp::new();
    let token = app.token();
    app.stub.panic_in_stats.store(true, Ordering::SeqCst);

    let res = app.request(Method::GET, "/management/stats", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json["error"], "INTERNAL_SERVER_ERROR");
    assert_eq!(logs.count(Level::ERROR, "stats exploded"), 1, "{:?}", logs.messages());

    app.stub.panic_in_stats.store(false, Ordering::SeqCst);
    let res = app.request(Method::GET, "/management/stats", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.stub.calls("stats.stats"), 2);
}

#[tokio::test]
async fn login_and_feed_stay_outside_the_blanket_gate() {
    let app = TestApp::new();

    let login = app
        .state
        .routes
        .descriptors()
        .iter()
        .find(|route| route.action == Action::Login)
        .unwrap();
    assert!(!login.requires_auth());

    // The feed is served by its own route; the dispatcher has no entry for it
    let res = app
        .request(Method::POST, "/management/events/feed", None, None)
        .await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.stub.total_calls(), 0);
}

#[tokio::test]
async fn wrong_method_on_the_feed_is_a_typed_405() {
    let app = TestApp::new();

    let res = app
        .request(Method::DELETE, "/management/events/feed", None, None)
        .await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.json["error"], "METHOD_NOT_ALLOWED");
    assert_eq!(res.headers[header::ALLOW], "GET");
    assert!(res.headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn plain_get_on_the_feed_is_a_typed_400() {
    let app = TestApp::new();

    let res = app.request(Method::GET, "/management/events/feed", None, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["error"], "BAD_REQUEST");
    assert!(res.json["message"].is_string());
    assert!(res.headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn oversized_body_is_a_typed_413() {
    let app = TestApp::new();
    let limit = app.state.config.api.max_request_size_bytes;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/management/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(vec![b' '; limit + 1]))
        .unwrap();

    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.json["error"], "PAYLOAD_TOO_LARGE");
    assert!(res.headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(app.stub.total_calls(), 0);
}

#[tokio::test]
async fn huge_page_number_is_an_empty_page_not_a_500() {
    let config = common::test_config();
    let events = Arc::new(BroadcastEventSource::default());
    let state = AppState::new(config.clone(), memory::controllers(&config, events.clone()), events).unwrap();
    let token = state.verifier.issue(&common::admin_account()).unwrap().token;

    let request = Request::builder()
        .uri("/management/subjects?page=9223372036854775807&limit=100")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = cg_management::app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(page["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(page["page"], 9223372036854775807u64);
}

#[test]
fn registering_the_same_route_twice_fails() {
    let mut routes = RouteTableBuilder::new("/management");
    routes
        .route(Method::GET, "/stats", None, Action::Stats)
        .unwrap();

    let err = routes.route(Method::GET, "/stats/", None, Action::Events).unwrap_err();
    match err {
        RouteError::Duplicate { method, path } => {
            assert_eq!(method, Method::GET);
            assert_eq!(path, "/management/stats/");
        }
        other => panic!("expected duplicate, got {}", other),
    }
}

#[test]
fn auth_before_validation_is_refused() {
    let verifier = Arc::new(CredentialVerifier::new(&AppConfig::development().security).unwrap());
    let gates: Vec<Arc<dyn Gate>> = vec![
        Arc::new(CredentialGate::new(verifier)),
        Arc::new(ValidationGate::new(schemas::users_removal())),
    ];

    let mut routes = RouteTableBuilder::new("/management");
    let err = routes
        .register(Method::DELETE, "/users/:userId", gates, Action::RemoveUser)
        .unwrap_err();
    assert!(matches!(err, RouteError::GateOrder { gate: "users-removal", .. }));
}

#[test]
fn blanket_gate_only_applies_to_later_routes() {
    let verifier = Arc::new(CredentialVerifier::new(&AppConfig::development().security).unwrap());

    let mut routes = RouteTableBuilder::new("/management");
    routes
        .route(Method::POST, "/users/login", Some(schemas::users_login()), Action::Login)
        .unwrap();
    routes.use_gate(Arc::new(CredentialGate::new(verifier)));
    routes
        .route(Method::DELETE, "/users/:userId", Some(schemas::users_removal()), Action::RemoveUser)
        .unwrap();

    let table = routes.build();
    let names: Vec<_> = table.descriptors().iter().map(|r| r.gate_names()).collect();
    assert_eq!(names, vec![vec!["users-login"], vec!["users-removal", "verify-jwt"]]);
}
