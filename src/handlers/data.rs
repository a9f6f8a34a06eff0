use serde_json::Value;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;

use super::Reply;

/// GET /management/data/attributes-config
pub async fn attributes_config(state: &AppState) -> Result<Reply, ApiError> {
    Ok(Reply::ok(state.controllers.data.attributes_config().await?))
}

/// PUT /management/data/attributes-config
pub async fn update_attributes_config(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let attributes = request.body.get("attributes").cloned().unwrap_or(Value::Null);
    Ok(Reply::ok(
        state.controllers.data.update_attributes_config(attributes).await?,
    ))
}
