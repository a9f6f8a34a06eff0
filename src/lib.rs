pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod router;
pub mod services;
pub mod state;
pub mod types;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Environment;
use crate::router::dispatch::dispatch;
use crate::router::routes::FEED_PATH;
use crate::state::AppState;

pub use state::StartupError;

/// Build the HTTP application.
///
/// The feed is a dedicated WebSocket route; every other request falls through
/// to the management dispatcher, which owns routing, gates and error mapping.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            FEED_PATH,
            get(feed::handler::subscribe).fallback(feed::handler::method_not_allowed),
        )
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors(&state));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn cors(state: &AppState) -> CorsLayer {
    if state.config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = state
        .config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "CG Management API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "login": "POST /management/users/login (public)",
            "feed": format!("{} (websocket)", FEED_PATH),
            "management": "/management/* (bearer token)",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    }))
}
