use async_trait::async_trait;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::router::lifecycle::RequestState;
use crate::validation::Schema;

use super::Gate;

/// Runs one route's schema and rejects with every violated field.
pub struct ValidationGate {
    schema: Schema,
}

impl ValidationGate {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl Gate for ValidationGate {
    fn name(&self) -> &'static str {
        self.schema.name
    }

    fn stage(&self) -> RequestState {
        RequestState::Validating
    }

    async fn check(&self, request: &mut ManagementRequest) -> Result<(), ApiError> {
        self.schema.apply(request).map_err(|violations| {
            tracing::debug!(
                "Validation '{}' rejected {} field(s)",
                self.schema.name,
                violations.len()
            );
            ApiError::validation_error("Request validation failed", violations)
        })
    }
}
