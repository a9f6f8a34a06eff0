use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::router::lifecycle::RequestState;

use super::Gate;

/// Blanket JWT gate: verifies the bearer token and attaches the principal.
pub struct CredentialGate {
    verifier: Arc<CredentialVerifier>,
}

impl CredentialGate {
    pub fn new(verifier: Arc<CredentialVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Gate for CredentialGate {
    fn name(&self) -> &'static str {
        "verify-jwt"
    }

    fn stage(&self) -> RequestState {
        RequestState::Authenticating
    }

    async fn check(&self, request: &mut ManagementRequest) -> Result<(), ApiError> {
        let principal = self.verifier.verify_headers(&request.headers)?;

        tracing::debug!(
            "Credential accepted: user {} ({}) with role {}",
            principal.user_id,
            principal.email,
            principal.role
        );

        request.principal = Some(principal);
        Ok(())
    }
}
