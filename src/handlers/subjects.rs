use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;
use crate::types::{Page, RectificationStatusUpdate};

use super::Reply;

/// GET /management/subjects?page&limit
pub async fn list(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let page: Page = request.query_as()?;
    Ok(Reply::ok(state.controllers.subjects.list_subjects(page).await?))
}

/// GET /management/subjects/rectification-requests?page&limit - pending requests
pub async fn list_rectification_requests(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let page: Page = request.query_as()?;
    Ok(Reply::ok(state.controllers.subjects.list_rectification_requests(page).await?))
}

/// GET /management/subjects/rectification-requests/archive?page&limit - processed requests
pub async fn list_archive(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let page: Page = request.query_as()?;
    Ok(Reply::ok(
        state.controllers.subjects.list_processed_rectification_requests(page).await?,
    ))
}

/// GET /management/subjects/rectification-requests/:rectificationRequestId
pub async fn get_rectification_request(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let id: u64 = request.param("rectificationRequestId")?;
    Ok(Reply::ok(state.controllers.subjects.get_rectification_request(id).await?))
}

/// GET /management/subjects/:subjectId/data
///
/// `subjectId` is opaque to the gateway and handed through as-is.
pub async fn request_data_access(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let subject_id: String = request.param("subjectId")?;
    Ok(Reply::ok(state.controllers.subjects.request_data_access(&subject_id).await?))
}

/// PUT /management/subjects/rectification-requests/:rectificationRequestId
pub async fn update_rectification_status(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let id: u64 = request.param("rectificationRequestId")?;
    let update: RectificationStatusUpdate = request.body_as()?;

    let updated = state
        .controllers
        .subjects
        .update_rectification_status(id, update.status)
        .await?;

    tracing::info!(
        "Rectification request {} marked {:?} by {}",
        id,
        update.status,
        request.principal()?.email
    );
    Ok(Reply::ok(updated))
}
