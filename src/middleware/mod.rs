// Request gates: the stages a request must clear before its handler runs.
//
// Every route carries an explicit, ordered list of gates. Validation gates
// always come before the credential gate, so a request that is both malformed
// and unauthenticated is reported as malformed.

pub mod auth;
pub mod validate;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::router::lifecycle::RequestState;

pub use auth::CredentialGate;
pub use validate::ValidationGate;

#[async_trait]
pub trait Gate: Send + Sync {
    /// Gate name for logging and route introspection
    fn name(&self) -> &'static str;

    /// Lifecycle state the request is in while this gate runs
    fn stage(&self) -> RequestState;

    /// Check the request. A gate may enrich the request (normalized input,
    /// principal) but must leave it untouched when it fails.
    async fn check(&self, request: &mut ManagementRequest) -> Result<(), ApiError>;
}
