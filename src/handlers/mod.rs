// handlers/mod.rs - Domain controller operations reachable through the route table
//
// Each route dispatches to exactly one Action. Handlers pull their typed input
// out of the (already validated) request, call one controller method and
// shape the reply.

pub mod contract;
pub mod data;
pub mod processors;
pub mod reply;
pub mod stats;
pub mod subjects;
pub mod users;

use crate::error::ApiError;
use crate::request::ManagementRequest;
use crate::state::AppState;

pub use reply::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Login,

    ContractDetails,
    ContractDeploy,

    ListSubjects,
    ListRectificationRequests,
    ListProcessedRectificationRequests,
    GetRectificationRequest,
    RequestDataAccess,
    UpdateRectificationStatus,

    ListProcessors,
    AddProcessor,
    UpdateProcessor,
    RemoveProcessors,
    #[cfg(feature = "test-routes")]
    TestAddProcessor,
    #[cfg(feature = "test-routes")]
    TestRemoveProcessors,

    ListUsers,
    RegisterUser,
    UpdatePassword,
    RemoveUser,

    GetAttributesConfig,
    UpdateAttributesConfig,

    Stats,
    Events,
}

impl Action {
    pub async fn invoke(self, state: &AppState, request: ManagementRequest) -> Result<Reply, ApiError> {
        match self {
            Action::Login => users::login(state, request).await,

            Action::ContractDetails => contract::details(state).await,
            Action::ContractDeploy => contract::deploy(state, request).await,

            Action::ListSubjects => subjects::list(state, request).await,
            Action::ListRectificationRequests => subjects::list_rectification_requests(state, request).await,
            Action::ListProcessedRectificationRequests => subjects::list_archive(state, request).await,
            Action::GetRectificationRequest => subjects::get_rectification_request(state, request).await,
            Action::RequestDataAccess => subjects::request_data_access(state, request).await,
            Action::UpdateRectificationStatus => subjects::update_rectification_status(state, request).await,

            Action::ListProcessors => processors::list(state).await,
            Action::AddProcessor => processors::add(state, request).await,
            Action::UpdateProcessor => processors::update(state, request).await,
            Action::RemoveProcessors => processors::remove(state, request).await,
            #[cfg(feature = "test-routes")]
            Action::TestAddProcessor => processors::test_add(state, request).await,
            #[cfg(feature = "test-routes")]
            Action::TestRemoveProcessors => processors::test_remove(state, request).await,

            Action::ListUsers => users::list(state).await,
            Action::RegisterUser => users::register(state, request).await,
            Action::UpdatePassword => users::update_password(state, request).await,
            Action::RemoveUser => users::remove(state, request).await,

            Action::GetAttributesConfig => data::attributes_config(state).await,
            Action::UpdateAttributesConfig => data::update_attributes_config(state, request).await,

            Action::Stats => stats::stats(state).await,
            Action::Events => stats::events(state).await,
        }
    }
}
