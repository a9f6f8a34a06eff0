#![allow(dead_code)]

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use cg_management::auth::{Claims, Principal};
use cg_management::config::AppConfig;
use cg_management::feed::{BroadcastEventSource, EventSource, Registration, RegistrationId, UpstreamError};
use cg_management::services::{
    ContractService, ControllerError, ControllerResult, Controllers, DataService, ProcessorsService, StatsService,
    SubjectsService, UsersService,
};
use cg_management::state::AppState;
use cg_management::types::{
    DeployContract, NewProcessor, NewUser, Page, ProcessorUpdate, RectificationStatus, TestProcessor, UserAccount,
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub fn admin_account() -> UserAccount {
    UserAccount {
        id: 1,
        email: ADMIN_EMAIL.to_string(),
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
        role: "admin".to_string(),
    }
}

/// Development profile with short feed timeouts so failure paths finish fast
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.feed.registration_timeout_ms = 200;
    config.api.enable_request_logging = false;
    config
}

// ---------------------------------------------------------------------------
// Counting stub controllers
// ---------------------------------------------------------------------------

/// One stub behind every controller trait. Records each call by name so tests
/// can assert that rejected requests never reached a controller.
#[derive(Default)]
pub struct StubControllers {
    calls: Mutex<Vec<&'static str>>,
    pub last_page: Mutex<Option<Page>>,
    pub panic_in_stats: AtomicBool,
    pub fail_stats: AtomicBool,
}

impl StubControllers {
    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn controllers(self: &Arc<Self>) -> Controllers {
        Controllers {
            contract: self.clone(),
            subjects: self.clone(),
            processors: self.clone(),
            users: self.clone(),
            data: self.clone(),
            stats: self.clone(),
        }
    }
}

#[async_trait]
impl ContractService for StubControllers {
    async fn details(&self) -> ControllerResult<Value> {
        self.record("contract.details");
        Ok(json!({ "address": "0x0000000000000000000000000000000000000001" }))
    }

    async fn deploy(&self, request: DeployContract) -> ControllerResult<Value> {
        self.record("contract.deploy");
        Ok(json!({ "processors": request.processors }))
    }
}

#[async_trait]
impl SubjectsService for StubControllers {
    async fn list_subjects(&self, page: Page) -> ControllerResult<Value> {
        self.record("subjects.list");
        *self.last_page.lock().unwrap() = Some(page);
        Ok(json!({ "items": [], "page": page.page, "limit": page.limit }))
    }

    async fn list_rectification_requests(&self, page: Page) -> ControllerResult<Value> {
        self.record("subjects.rectification_requests");
        *self.last_page.lock().unwrap() = Some(page);
        Ok(json!({ "items": [] }))
    }

    async fn list_processed_rectification_requests(&self, page: Page) -> ControllerResult<Value> {
        self.record("subjects.archive");
        *self.last_page.lock().unwrap() = Some(page);
        Ok(json!({ "items": [] }))
    }

    async fn get_rectification_request(&self, id: u64) -> ControllerResult<Value> {
        self.record("subjects.get_rectification_request");
        if id == 404 {
            return Err(ControllerError::NotFound(format!("Rectification request {} not found", id)));
        }
        Ok(json!({ "id": id }))
    }

    async fn request_data_access(&self, subject_id: &str) -> ControllerResult<Value> {
        self.record("subjects.request_data_access");
        Ok(json!({ "subjectId": subject_id }))
    }

    async fn update_rectification_status(&self, id: u64, status: RectificationStatus) -> ControllerResult<Value> {
        self.record("subjects.update_rectification_status");
        Ok(json!({ "id": id, "status": status }))
    }
}

#[async_trait]
impl ProcessorsService for StubControllers {
    async fn list(&self) -> ControllerResult<Value> {
        self.record("processors.list");
        Ok(json!([]))
    }

    async fn add(&self, processor: NewProcessor) -> ControllerResult<Value> {
        self.record("processors.add");
        Ok(json!({ "id": 1, "name": processor.name }))
    }

    async fn update(&self, update: ProcessorUpdate) -> ControllerResult<Value> {
        self.record("processors.update");
        Ok(json!({ "id": update.id }))
    }

    async fn remove(&self, ids: Vec<u64>) -> ControllerResult<Value> {
        self.record("processors.remove");
        Ok(json!({ "removed": ids }))
    }

    async fn test_add(&self, processor: TestProcessor) -> ControllerResult<Value> {
        self.record("processors.test_add");
        Ok(json!({ "ethAddress": processor.eth_address }))
    }

    async fn test_remove(&self, eth_addresses: Vec<String>) -> ControllerResult<Value> {
        self.record("processors.test_remove");
        Ok(json!({ "removed": eth_addresses.len() }))
    }
}

#[async_trait]
impl UsersService for StubControllers {
    async fn authenticate(&self, email: &str, password: &str) -> ControllerResult<UserAccount> {
        self.record("users.authenticate");
        if email == ADMIN_EMAIL && password == ADMIN_PASSWORD {
            Ok(admin_account())
        } else {
            Err(ControllerError::InvalidCredentials)
        }
    }

    async fn list(&self) -> ControllerResult<Vec<UserAccount>> {
        self.record("users.list");
        Ok(vec![admin_account()])
    }

    async fn register(&self, _principal: &Principal, user: NewUser) -> ControllerResult<UserAccount> {
        self.record("users.register");
        Ok(UserAccount {
            id: 2,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        })
    }

    async fn update_password(&self, _principal: &Principal, _user_id: u64, _password: &str) -> ControllerResult<()> {
        self.record("users.update_password");
        Ok(())
    }

    async fn remove(&self, _principal: &Principal, _user_id: u64) -> ControllerResult<()> {
        self.record("users.remove");
        Ok(())
    }
}

#[async_trait]
impl DataService for StubControllers {
    async fn attributes_config(&self) -> ControllerResult<Value> {
        self.record("data.attributes_config");
        Ok(json!({ "attributes": {} }))
    }

    async fn update_attributes_config(&self, attributes: Value) -> ControllerResult<Value> {
        self.record("data.update_attributes_config");
        Ok(json!({ "attributes": attributes }))
    }
}

#[async_trait]
impl StatsService for StubControllers {
    async fn stats(&self) -> ControllerResult<Value> {
        self.record("stats.stats");
        if self.panic_in_stats.load(Ordering::SeqCst) {
            panic!("stats exploded");
        }
        if self.fail_stats.load(Ordering::SeqCst) {
            return Err(ControllerError::Internal("database password is hunter2".to_string()));
        }
        Ok(json!({ "processors": 0, "users": 1 }))
    }

    async fn events(&self) -> ControllerResult<Value> {
        self.record("stats.events");
        Ok(json!([]))
    }
}

// ---------------------------------------------------------------------------
// Event sources
// ---------------------------------------------------------------------------

/// Upstream that cannot be reached: registration fails, or never answers
pub struct UnreachableSource {
    pub hang: bool,
    pub registrations: AtomicUsize,
}

impl UnreachableSource {
    pub fn failing() -> Self {
        Self {
            hang: false,
            registrations: AtomicUsize::new(0),
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            registrations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EventSource for UnreachableSource {
    async fn register(&self) -> Result<Registration, UpstreamError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Err(UpstreamError::Unavailable("connection refused".to_string()))
    }

    async fn unregister(&self, id: RegistrationId) -> Result<(), UpstreamError> {
        Err(UpstreamError::UnknownRegistration(id))
    }
}

/// Wraps the broadcast hub and counts unregister calls
pub struct CountingSource {
    pub inner: Arc<BroadcastEventSource>,
    pub unregisters: AtomicUsize,
    pub fail_unregister: bool,
}

impl CountingSource {
    pub fn new(inner: Arc<BroadcastEventSource>, fail_unregister: bool) -> Self {
        Self {
            inner,
            unregisters: AtomicUsize::new(0),
            fail_unregister,
        }
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregisters.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for CountingSource {
    async fn register(&self) -> Result<Registration, UpstreamError> {
        self.inner.register().await
    }

    async fn unregister(&self, id: RegistrationId) -> Result<(), UpstreamError> {
        self.unregisters.fetch_add(1, Ordering::SeqCst);
        self.inner.unregister(id).await?;
        if self.fail_unregister {
            return Err(UpstreamError::Stream("upstream refused to unregister".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Application helpers
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub stub: Arc<StubControllers>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_source(test_config(), Arc::new(BroadcastEventSource::default()))
    }

    pub fn with_source(config: AppConfig, source: Arc<dyn EventSource>) -> Self {
        let stub = Arc::new(StubControllers::default());
        let state = AppState::new(config, stub.controllers(), source).expect("state");
        let router = cg_management::app(state.clone());
        Self { state, router, stub }
    }

    /// Token for the admin account, signed with the app's own secret
    pub fn token(&self) -> String {
        self.state.verifier.issue(&admin_account()).expect("token").token
    }

    pub fn token_with(&self, role: &str, exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            user_id: 1,
            email: ADMIN_EMAIL.to_string(),
            role: role.to_string(),
            iss: self.state.verifier.issuer().to_string(),
            exp: now + exp_offset_secs,
            iat: now - 7200,
        };
        self.state.verifier.sign(&claims).expect("signed token")
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.expect("infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        Response { status, headers, json }
    }
}

pub struct Response {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub json: Value,
}

/// Bind the app on an ephemeral local port and serve it in the background
pub async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = cg_management::app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    addr
}

/// Fill `:param` segments of a route pattern with a placeholder value
pub fn concrete_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| if segment.starts_with(':') { "1" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Records every event emitted on the current thread while alive.
///
/// `#[tokio::test]` runs a current-thread runtime, so tasks spawned by the
/// test are captured too.
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
    _guard: DefaultGuard,
}

impl LogCapture {
    pub fn start() -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            events: events.clone(),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        Self { events, _guard: guard }
    }

    /// Number of events at `level` whose message contains `needle`
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, message)| *l == level && message.contains(needle))
            .count()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor(String::new());
        event.record(&mut message);
        self.events.lock().unwrap().push((*event.metadata().level(), message.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}
