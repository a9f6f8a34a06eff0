use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;
use crate::types::DeployContract;

use super::Reply;

/// GET /management/contract/details
pub async fn details(state: &AppState) -> Result<Reply, ApiError> {
    let details = state.controllers.contract.details().await?;
    Ok(Reply::ok(details))
}

/// POST /management/contract/deploy
///
/// Deploys the governance contract with an initial processor allow-list.
pub async fn deploy(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let deploy: DeployContract = request.body_as()?;
    let principal = request.principal()?;

    tracing::info!(
        "Contract deployment requested by {} with {} processor(s)",
        principal.email,
        deploy.processors.len()
    );

    let deployed = state.controllers.contract.deploy(deploy).await?;
    Ok(Reply::created(deployed))
}
