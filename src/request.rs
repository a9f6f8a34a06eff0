use axum::http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::auth::Principal;
use crate::error::ApiError;

/// Request context threaded through the gates and into a handler.
///
/// Path and query values arrive as JSON strings and are coerced in place by the
/// route's validator, so handlers read typed values back out with
/// [`ManagementRequest::param`], [`ManagementRequest::query_as`] and
/// [`ManagementRequest::body_as`].
#[derive(Debug, Clone)]
pub struct ManagementRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub body: Value,
    pub principal: Option<Principal>,
}

impl ManagementRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: Map::new(),
            query: Map::new(),
            body: Value::Null,
            principal: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.params = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self
    }

    pub fn with_query<I>(mut self, query: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query = query.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Path parameter, deserialized into the requested type
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Result<T, ApiError> {
        let value = self
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::bad_request(format!("Missing path parameter '{}'", name)))?;

        serde_json::from_value(value)
            .map_err(|e| ApiError::bad_request(format!("Invalid path parameter '{}': {}", name, e)))
    }

    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.query.clone()))
            .map_err(|e| ApiError::bad_request(format!("Invalid query: {}", e)))
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
    }

    /// The verified principal; only present after the credential gate ran
    pub fn principal(&self) -> Result<&Principal, ApiError> {
        self.principal
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}
