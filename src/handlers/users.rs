use serde::Serialize;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;
use crate::types::{LoginRequest, NewUser, PasswordUpdate, UserAccount};

use super::Reply;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserAccount,
}

/// POST /management/users/login - exchange credentials for a bearer token
///
/// Expected Input:
/// ```json
/// { "email": "admin@example.com", "password": "..." }
/// ```
pub async fn login(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let credentials: LoginRequest = request.body_as()?;

    let account = match state
        .controllers
        .users
        .authenticate(&credentials.email, &credentials.password)
        .await
    {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!("Login failed for {}: {}", credentials.email, e);
            return Err(e.into());
        }
    };

    let issued = state.verifier.issue(&account)?;
    tracing::info!("User {} (id {}) logged in", account.email, account.id);

    Reply::json(&LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        user: account,
    })
}

/// GET /management/users
pub async fn list(state: &AppState) -> Result<Reply, ApiError> {
    let users = state.controllers.users.list().await?;
    Reply::json(&users)
}

/// POST /management/users
pub async fn register(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let user: NewUser = request.body_as()?;
    let principal = request.principal()?;
    let created = state.controllers.users.register(principal, user).await?;

    tracing::info!("User {} registered by {}", created.email, principal.email);
    Reply::json(&created).map(|reply| Reply::created(reply.body))
}

/// POST /management/users/:userId/update-password
pub async fn update_password(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let user_id: u64 = request.param("userId")?;
    let PasswordUpdate { password } = request.body_as()?;

    state
        .controllers
        .users
        .update_password(request.principal()?, user_id, &password)
        .await?;
    Ok(Reply::no_content())
}

/// DELETE /management/users/:userId
pub async fn remove(state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
    let user_id: u64 = request.param("userId")?;
    let principal = request.principal()?;

    state.controllers.users.remove(principal, user_id).await?;
    tracing::info!("User {} removed by {}", user_id, principal.email);
    Ok(Reply::no_content())
}
