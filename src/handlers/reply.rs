use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Successful controller response. The body is whatever JSON the controller
/// produced; the gateway adds no envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub body: Value,
    pub status: StatusCode,
}

impl Reply {
    /// 200 OK with the given body
    pub fn ok(body: Value) -> Self {
        Self::with_status(body, StatusCode::OK)
    }

    pub fn with_status(body: Value, status: StatusCode) -> Self {
        Self { body, status }
    }

    /// 201 Created
    pub fn created(body: Value) -> Self {
        Self::with_status(body, StatusCode::CREATED)
    }

    /// 204 No Content (body is ignored)
    pub fn no_content() -> Self {
        Self::with_status(Value::Null, StatusCode::NO_CONTENT)
    }

    /// Serialize typed data into a 200 reply
    pub fn json<T: Serialize>(data: &T) -> Result<Self, ApiError> {
        serde_json::to_value(data).map(Self::ok).map_err(|e| {
            tracing::error!("Failed to serialize response data: {}", e);
            ApiError::handler_failure("Failed to serialize response data")
        })
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        // For 204 No Content, return empty response
        if self.status == StatusCode::NO_CONTENT {
            return self.status.into_response();
        }

        (self.status, Json(self.body)).into_response()
    }
}
