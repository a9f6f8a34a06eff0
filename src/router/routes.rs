// Management route registrations.
//
// Order matters: login is registered before the credential gate is installed,
// everything after it inherits the gate. The live event feed is a WebSocket
// route served outside this table (see `feed::handler`).

use axum::http::Method;
use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::handlers::Action;
use crate::middleware::CredentialGate;
use crate::validation::schemas;

use super::{RouteError, RouteTable, RouteTableBuilder};

pub const MANAGEMENT_PREFIX: &str = "/management";
pub const FEED_PATH: &str = "/management/events/feed";

pub fn management_routes(verifier: Arc<CredentialVerifier>) -> Result<RouteTable, RouteError> {
    let mut routes = RouteTableBuilder::new(MANAGEMENT_PREFIX);

    routes.route(Method::POST, "/users/login", Some(schemas::users_login()), Action::Login)?;

    routes.use_gate(Arc::new(CredentialGate::new(verifier)));

    // Contract
    routes
        .route(Method::GET, "/contract/details", None, Action::ContractDetails)?
        .route(Method::POST, "/contract/deploy", Some(schemas::contract_deploy()), Action::ContractDeploy)?;

    // Data subjects and rectification requests
    routes
        .route(Method::GET, "/subjects", Some(schemas::list_subjects()), Action::ListSubjects)?
        .route(
            Method::GET,
            "/subjects/rectification-requests",
            Some(schemas::list_rectification_requests()),
            Action::ListRectificationRequests,
        )?
        .route(
            Method::GET,
            "/subjects/rectification-requests/archive",
            Some(schemas::list_rectification_requests()),
            Action::ListProcessedRectificationRequests,
        )?
        .route(
            Method::GET,
            "/subjects/rectification-requests/:rectificationRequestId",
            Some(schemas::get_rectification()),
            Action::GetRectificationRequest,
        )?
        .route(Method::GET, "/subjects/:subjectId/data", None, Action::RequestDataAccess)?
        .route(
            Method::PUT,
            "/subjects/rectification-requests/:rectificationRequestId",
            Some(schemas::update_rectification_status()),
            Action::UpdateRectificationStatus,
        )?;

    // Processors
    routes
        .route(Method::GET, "/processors", None, Action::ListProcessors)?
        .route(Method::POST, "/processors", Some(schemas::add_processor()), Action::AddProcessor)?
        .route(Method::PUT, "/processors", Some(schemas::update_processor()), Action::UpdateProcessor)?
        .route(Method::DELETE, "/processors", Some(schemas::delete_processor()), Action::RemoveProcessors)?;

    // Users
    routes
        .route(Method::GET, "/users", None, Action::ListUsers)?
        .route(Method::POST, "/users", Some(schemas::users_registration()), Action::RegisterUser)?
        .route(
            Method::POST,
            "/users/:userId/update-password",
            Some(schemas::users_update_password()),
            Action::UpdatePassword,
        )?
        .route(Method::DELETE, "/users/:userId", Some(schemas::users_removal()), Action::RemoveUser)?;

    // Data configuration
    routes
        .route(Method::GET, "/data/attributes-config", None, Action::GetAttributesConfig)?
        .route(
            Method::PUT,
            "/data/attributes-config",
            Some(schemas::update_attributes_config()),
            Action::UpdateAttributesConfig,
        )?;

    // Stats
    routes
        .route(Method::GET, "/stats", None, Action::Stats)?
        .route(Method::GET, "/events", None, Action::Events)?;

    // Development fixtures, compiled only with the `test-routes` feature
    #[cfg(feature = "test-routes")]
    {
        tracing::warn!("Development routes under {}/processors/TEST are enabled", MANAGEMENT_PREFIX);
        routes
            .route(
                Method::POST,
                "/processors/TEST",
                Some(schemas::test_add_processor()),
                Action::TestAddProcessor,
            )?
            .route(
                Method::DELETE,
                "/processors/TEST",
                Some(schemas::test_delete_processors()),
                Action::TestRemoveProcessors,
            )?;
    }

    Ok(routes.build())
}
