use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;
use crate::types::{NewProcessor, ProcessorUpdate, RemoveProcessors};

use super::Reply;

/// GET /management/processors
pub async fn list(state: &AppState) -> Result<Reply, ApiError> {
    Ok(Reply::ok(state.controllers.processors.list().await?))
}

/// POST /management/processors
pub async fn add(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let processor: NewProcessor = request.body_as()?;
    Ok(Reply::created(state.controllers.processors.add(processor).await?))
}

/// PUT /management/processors
pub async fn update(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let update: ProcessorUpdate = request.body_as()?;
    Ok(Reply::ok(state.controllers.processors.update(update).await?))
}

/// DELETE /management/processors
pub async fn remove(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let RemoveProcessors { ids } = request.body_as()?;
    Ok(Reply::ok(state.controllers.processors.remove(ids).await?))
}

/// POST /management/processors/TEST
#[cfg(feature = "test-routes")]
pub async fn test_add(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let processor: crate::types::TestProcessor = request.body_as()?;
    Ok(Reply::created(state.controllers.processors.test_add(processor).await?))
}

/// DELETE /management/processors/TEST
#[cfg(feature = "test-routes")]
pub async fn test_remove(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let crate::types::TestRemoveProcessors { eth_addresses } = request.body_as()?;
    Ok(Reply::ok(state.controllers.processors.test_remove(eth_addresses).await?))
}
