use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::router::dispatch::{panic_message, tag_request_id};
use crate::state::AppState;

use super::FeedSubscriber;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Bearer token for clients that cannot set headers on the upgrade request
    pub token: Option<String>,
}

/// GET /management/events/feed
///
/// Handshake failures are answered with the same JSON error body and
/// `x-request-id` header as dispatched routes. The id doubles as the
/// connection id once upgraded.
pub async fn subscribe(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    query: Result<Query<FeedQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let connection_id = Uuid::new_v4();
    let mut response = match handshake(ws, &state, query, &headers, connection_id) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    tag_request_id(&mut response, connection_id);
    response
}

/// Any method other than GET on the feed path
pub async fn method_not_allowed(method: Method) -> Response {
    tracing::info!("Method {} not allowed on the feed", method);
    let mut response =
        ApiError::method_not_allowed(format!("Method {} not allowed", method), vec![Method::GET]).into_response();
    tag_request_id(&mut response, Uuid::new_v4());
    response
}

fn handshake(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    state: &AppState,
    query: Result<Query<FeedQuery>, QueryRejection>,
    headers: &HeaderMap,
    connection_id: Uuid,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e.body_text())))?;

    if state.config.feed.require_auth {
        let verified = match query.token.as_deref() {
            Some(token) => state.verifier.verify_token(token),
            None => state.verifier.verify_headers(headers),
        };

        match verified {
            Ok(principal) => tracing::info!("Feed authenticated for {}", principal.email),
            Err(e) => {
                tracing::warn!("Feed connection rejected: {}", e);
                return Err(ApiError::from(e));
            }
        }
    }

    let ws = ws.map_err(|rejection| {
        tracing::info!("Feed handshake rejected: {}", rejection.body_text());
        if rejection.status() == StatusCode::METHOD_NOT_ALLOWED {
            ApiError::method_not_allowed("Feed requires GET", vec![Method::GET])
        } else {
            ApiError::bad_request(rejection.body_text())
        }
    })?;

    let feed = state.feed.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, feed, connection_id)))
}

async fn handle_socket(socket: WebSocket, feed: Arc<FeedSubscriber>, connection_id: Uuid) {
    let span = tracing::info_span!("feed", %connection_id);
    let (outbound, inbound) = socket.split();

    tracing::info!(parent: &span, "Feed connection opened");

    let outcome = AssertUnwindSafe(feed.run(connection_id, outbound, inbound))
        .catch_unwind()
        .instrument(span.clone())
        .await;

    match outcome {
        Ok(subscription) => tracing::info!(
            parent: &span,
            "Feed connection finished: {} event(s) delivered, last error: {:?}",
            subscription.delivered,
            subscription.last_error
        ),
        Err(panic) => tracing::error!(
            parent: &span,
            "Feed connection handler panicked: {}",
            panic_message(&*panic)
        ),
    }
}
