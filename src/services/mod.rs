// Domain controllers: the business services behind each management route.
//
// The gateway only sees these traits. Implementations are constructed once at
// startup and handed to the dispatcher through `Controllers`.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::Principal;
use crate::types::{
    DeployContract, NewProcessor, NewUser, Page, ProcessorUpdate, RectificationStatus, TestProcessor,
    UserAccount,
};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

#[async_trait]
pub trait ContractService: Send + Sync {
    async fn details(&self) -> ControllerResult<Value>;
    async fn deploy(&self, request: DeployContract) -> ControllerResult<Value>;
}

#[async_trait]
pub trait SubjectsService: Send + Sync {
    async fn list_subjects(&self, page: Page) -> ControllerResult<Value>;
    async fn list_rectification_requests(&self, page: Page) -> ControllerResult<Value>;
    async fn list_processed_rectification_requests(&self, page: Page) -> ControllerResult<Value>;
    async fn get_rectification_request(&self, id: u64) -> ControllerResult<Value>;
    async fn request_data_access(&self, subject_id: &str) -> ControllerResult<Value>;
    async fn update_rectification_status(&self, id: u64, status: RectificationStatus) -> ControllerResult<Value>;
}

#[async_trait]
pub trait ProcessorsService: Send + Sync {
    async fn list(&self) -> ControllerResult<Value>;
    async fn add(&self, processor: NewProcessor) -> ControllerResult<Value>;
    async fn update(&self, update: ProcessorUpdate) -> ControllerResult<Value>;
    async fn remove(&self, ids: Vec<u64>) -> ControllerResult<Value>;

    /// Development fixture: add a processor without scope bookkeeping
    async fn test_add(&self, processor: TestProcessor) -> ControllerResult<Value>;

    /// Development fixture: remove processors by address
    async fn test_remove(&self, eth_addresses: Vec<String>) -> ControllerResult<Value>;
}

#[async_trait]
pub trait UsersService: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> ControllerResult<UserAccount>;
    async fn list(&self) -> ControllerResult<Vec<UserAccount>>;
    async fn register(&self, principal: &Principal, user: NewUser) -> ControllerResult<UserAccount>;
    async fn update_password(&self, principal: &Principal, user_id: u64, password: &str) -> ControllerResult<()>;
    async fn remove(&self, principal: &Principal, user_id: u64) -> ControllerResult<()>;
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn attributes_config(&self) -> ControllerResult<Value>;
    async fn update_attributes_config(&self, attributes: Value) -> ControllerResult<Value>;
}

#[async_trait]
pub trait StatsService: Send + Sync {
    async fn stats(&self) -> ControllerResult<Value>;
    async fn events(&self) -> ControllerResult<Value>;
}

/// Every domain controller the dispatcher can reach
#[derive(Clone)]
pub struct Controllers {
    pub contract: Arc<dyn ContractService>,
    pub subjects: Arc<dyn SubjectsService>,
    pub processors: Arc<dyn ProcessorsService>,
    pub users: Arc<dyn UsersService>,
    pub data: Arc<dyn DataService>,
    pub stats: Arc<dyn StatsService>,
}
