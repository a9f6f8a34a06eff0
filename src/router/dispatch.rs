use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    http::{header::HeaderValue, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;

use super::lifecycle::{RequestLifecycle, RequestState};
use super::{Resolution, RouteDescriptor};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback handler for every `/management/*` request that is not the feed.
///
/// Resolves the route, runs its gates in order and invokes exactly one action.
/// Every outcome is a response; nothing escapes to the listener.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %method,
        path = %uri.path(),
    );

    let mut response = handle(&state, method, uri, headers, body)
        .instrument(span)
        .await;

    tag_request_id(&mut response, request_id);
    response
}

pub(crate) fn tag_request_id(response: &mut Response, request_id: Uuid) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

async fn handle(
    state: &AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let mut lifecycle = RequestLifecycle::new();
    let path = uri.path().to_string();

    let (route, params) = match state.routes.resolve(&method, &path) {
        Resolution::Matched { route, params } => (route, params),
        Resolution::MethodNotAllowed(allowed) => {
            lifecycle.advance(RequestState::Rejected);
            tracing::info!("Method {} not allowed on {}", method, path);
            return ApiError::method_not_allowed(format!("Method {} not allowed", method), allowed).into_response();
        }
        Resolution::NotFound => {
            lifecycle.advance(RequestState::Rejected);
            tracing::info!("No route for {} {}", method, path);
            return ApiError::not_found(format!("Route {} {} not found", method, path)).into_response();
        }
    };

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            lifecycle.advance(RequestState::Rejected);
            tracing::info!("Request body rejected: {}", rejection.body_text());
            return body_error(&rejection).into_response();
        }
    };

    let request = match build_request(method, path, headers, &uri, params, &body) {
        Ok(request) => request,
        Err(e) => {
            lifecycle.advance(RequestState::Rejected);
            tracing::info!("Request rejected before gates: {}", e);
            return e.into_response();
        }
    };

    run(state, route, request, &mut lifecycle).await
}

fn body_error(rejection: &BytesRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body exceeds the size limit")
    } else {
        ApiError::bad_request(rejection.body_text())
    }
}

fn build_request(
    method: Method,
    path: String,
    headers: HeaderMap,
    uri: &Uri,
    params: Vec<(String, String)>,
    body: &Bytes,
) -> Result<ManagementRequest, ApiError> {
    let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e)))?;

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))?
    };

    Ok(ManagementRequest::new(method, path)
        .with_headers(headers)
        .with_params(params)
        .with_query(query)
        .with_body(body))
}

/// Run the gates of an already resolved route, then its action.
pub async fn run(
    state: &AppState,
    route: &RouteDescriptor,
    mut request: ManagementRequest,
    lifecycle: &mut RequestLifecycle,
) -> Response {
    for gate in &route.gates {
        lifecycle.advance(gate.stage());

        if let Err(e) = gate.check(&mut request).await {
            lifecycle.advance(RequestState::Rejected);
            tracing::warn!(
                "Gate '{}' rejected {} {}: {}",
                gate.name(),
                route.method,
                route.pattern,
                e
            );
            return e.into_response();
        }
    }

    lifecycle.advance(RequestState::Dispatching);
    tracing::debug!("Dispatching to {:?}", route.action);

    let outcome = AssertUnwindSafe(route.action.invoke(state, request))
        .catch_unwind()
        .await;
    lifecycle.advance(RequestState::Completed);

    match outcome {
        Ok(Ok(reply)) => {
            tracing::debug!("{:?} completed with {}", route.action, reply.status);
            reply.into_response()
        }
        Ok(Err(e)) => {
            if e.is_client_error() {
                tracing::info!("{:?} returned {}: {}", route.action, e.status_code(), e);
            } else {
                tracing::error!("{:?} failed: {}", route.action, e);
            }
            e.into_response()
        }
        Err(panic) => {
            tracing::error!("{:?} panicked: {}", route.action, panic_message(&*panic));
            ApiError::handler_failure("Internal server error").into_response()
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
