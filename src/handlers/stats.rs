use crate::error::ApiError;
use crate::state::AppState;

use super::Reply;

/// GET /management/stats
pub async fn stats(state: &AppState) -> Result<Reply, ApiError> {
    Ok(Reply::ok(state.controllers.stats.stats().await?))
}

/// GET /management/events - recent chain events, newest first
pub async fn events(state: &AppState) -> Result<Reply, ApiError> {
    Ok(Reply::ok(state.controllers.stats.events().await?))
}
