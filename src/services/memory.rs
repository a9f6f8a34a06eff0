// In-memory controllers so the gateway runs standalone.
//
// Every store publishes its state changes to the shared event hub, which is
// what the live feed and `GET /management/events` read from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Principal;
use crate::config::AppConfig;
use crate::feed::source::{sha256_hex, BroadcastEventSource};
use crate::types::{
    DeployContract, NewProcessor, NewUser, Page, ProcessorUpdate, RectificationStatus, TestProcessor,
    UserAccount,
};

use super::{
    ContractService, ControllerError, ControllerResult, Controllers, DataService, ProcessorsService, StatsService,
    SubjectsService, UsersService,
};

/// Wire up every in-memory controller around one event hub
pub fn controllers(config: &AppConfig, events: Arc<BroadcastEventSource>) -> Controllers {
    let contract = Arc::new(MemoryContract::new(events.clone()));
    let subjects = Arc::new(MemorySubjects::new(events.clone()));
    let processors = Arc::new(MemoryProcessors::new(events.clone()));

    let admin = match (&config.security.admin_email, &config.security.admin_password) {
        (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
        _ => None,
    };
    let users = Arc::new(MemoryUsers::new(admin));

    let stats = Arc::new(MemoryStats {
        contract: contract.clone(),
        subjects: subjects.clone(),
        processors: processors.clone(),
        users: users.clone(),
        events,
        history_limit: config.feed.history_limit,
    });

    Controllers {
        contract,
        subjects,
        processors,
        users,
        data: Arc::new(MemoryData::default()),
        stats,
    }
}

fn paginate<T: Serialize>(items: &[T], page: &Page) -> Value {
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    let window: Vec<&T> = items.iter().skip(page.offset()).take(limit).collect();
    json!({
        "items": window,
        "total": items.len(),
        "page": page.page,
        "limit": page.limit,
    })
}

fn to_value<T: Serialize>(data: &T) -> ControllerResult<Value> {
    serde_json::to_value(data).map_err(|e| ControllerError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployedContract {
    address: String,
    processors: Vec<String>,
    data_subjects_can_update: bool,
    deployed_at: DateTime<Utc>,
}

pub struct MemoryContract {
    events: Arc<BroadcastEventSource>,
    deployed: RwLock<Option<DeployedContract>>,
}

impl MemoryContract {
    pub fn new(events: Arc<BroadcastEventSource>) -> Self {
        Self {
            events,
            deployed: RwLock::new(None),
        }
    }

    pub async fn is_deployed(&self) -> bool {
        self.deployed.read().await.is_some()
    }
}

#[async_trait]
impl ContractService for MemoryContract {
    async fn details(&self) -> ControllerResult<Value> {
        match self.deployed.read().await.as_ref() {
            Some(contract) => to_value(contract),
            None => Err(ControllerError::NotFound("Contract has not been deployed".to_string())),
        }
    }

    async fn deploy(&self, request: DeployContract) -> ControllerResult<Value> {
        let mut deployed = self.deployed.write().await;
        if let Some(existing) = deployed.as_ref() {
            return Err(ControllerError::Conflict(format!(
                "Contract already deployed at {}",
                existing.address
            )));
        }

        let digest = sha256_hex(&Uuid::new_v4().to_string());
        let contract = DeployedContract {
            address: format!("0x{}", &digest[..40]),
            processors: request.processors,
            data_subjects_can_update: request.data_subjects_can_update.unwrap_or(false),
            deployed_at: Utc::now(),
        };
        let value = to_value(&contract)?;
        *deployed = Some(contract);
        drop(deployed);

        self.events.publish("ContractDeployed", value.clone()).await;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Processor {
    id: u64,
    name: String,
    eth_address: String,
    scope: Vec<String>,
}

pub struct MemoryProcessors {
    events: Arc<BroadcastEventSource>,
    processors: RwLock<Vec<Processor>>,
    next_id: AtomicU64,
}

impl MemoryProcessors {
    pub fn new(events: Arc<BroadcastEventSource>) -> Self {
        Self {
            events,
            processors: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn count(&self) -> usize {
        self.processors.read().await.len()
    }

    async fn insert(&self, name: String, eth_address: String, scope: Vec<String>) -> ControllerResult<Value> {
        let mut processors = self.processors.write().await;
        if processors
            .iter()
            .any(|p| p.eth_address.eq_ignore_ascii_case(&eth_address))
        {
            return Err(ControllerError::Conflict(format!(
                "Processor {} is already registered",
                eth_address
            )));
        }

        let processor = Processor {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name,
            eth_address,
            scope,
        };
        let value = to_value(&processor)?;
        processors.push(processor);
        drop(processors);

        self.events.publish("ProcessorAdded", value.clone()).await;
        Ok(value)
    }
}

#[async_trait]
impl ProcessorsService for MemoryProcessors {
    async fn list(&self) -> ControllerResult<Value> {
        to_value(&*self.processors.read().await)
    }

    async fn add(&self, processor: NewProcessor) -> ControllerResult<Value> {
        self.insert(processor.name, processor.eth_address, processor.scope).await
    }

    async fn update(&self, update: ProcessorUpdate) -> ControllerResult<Value> {
        let mut processors = self.processors.write().await;
        let processor = processors
            .iter_mut()
            .find(|p| p.id == update.id)
            .ok_or_else(|| ControllerError::NotFound(format!("Processor {} not found", update.id)))?;

        if let Some(name) = update.name {
            processor.name = name;
        }
        if let Some(scope) = update.scope {
            processor.scope = scope;
        }
        let value = to_value(&*processor)?;
        drop(processors);

        self.events.publish("ProcessorUpdated", value.clone()).await;
        Ok(value)
    }

    async fn remove(&self, ids: Vec<u64>) -> ControllerResult<Value> {
        let mut processors = self.processors.write().await;
        if let Some(missing) = ids.iter().find(|id| !processors.iter().any(|p| p.id == **id)) {
            return Err(ControllerError::NotFound(format!("Processor {} not found", missing)));
        }
        processors.retain(|p| !ids.contains(&p.id));
        drop(processors);

        let value = json!({ "removed": ids });
        self.events.publish("ProcessorsRemoved", value.clone()).await;
        Ok(value)
    }

    async fn test_add(&self, processor: TestProcessor) -> ControllerResult<Value> {
        let name = processor.name.unwrap_or_else(|| "Test processor".to_string());
        self.insert(name, processor.eth_address, Vec::new()).await
    }

    async fn test_remove(&self, eth_addresses: Vec<String>) -> ControllerResult<Value> {
        let mut processors = self.processors.write().await;
        let before = processors.len();
        processors.retain(|p| !eth_addresses.iter().any(|a| a.eq_ignore_ascii_case(&p.eth_address)));
        let removed = before - processors.len();
        drop(processors);

        let value = json!({ "removed": removed, "ethAddresses": eth_addresses });
        self.events.publish("ProcessorsRemoved", value.clone()).await;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Data subjects and rectification requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataSubject {
    id: String,
    data: Value,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RectificationRequest {
    id: u64,
    subject_id: String,
    attributes: Value,
    status: RectificationStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

pub struct MemorySubjects {
    events: Arc<BroadcastEventSource>,
    subjects: RwLock<Vec<DataSubject>>,
    requests: RwLock<Vec<RectificationRequest>>,
    next_id: AtomicU64,
}

impl MemorySubjects {
    pub fn new(events: Arc<BroadcastEventSource>) -> Self {
        Self {
            events,
            subjects: RwLock::new(Vec::new()),
            requests: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a data subject with its current personal data
    pub async fn add_subject(&self, id: &str, data: Value) {
        let mut subjects = self.subjects.write().await;
        match subjects.iter_mut().find(|s| s.id == id) {
            Some(subject) => subject.data = data,
            None => subjects.push(DataSubject {
                id: id.to_string(),
                data,
                registered_at: Utc::now(),
            }),
        }
    }

    /// File a pending rectification request on behalf of a subject
    pub async fn submit_rectification(&self, subject_id: &str, attributes: Value) -> ControllerResult<u64> {
        if !self.subjects.read().await.iter().any(|s| s.id == subject_id) {
            return Err(ControllerError::NotFound(format!("Data subject {} not found", subject_id)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(RectificationRequest {
            id,
            subject_id: subject_id.to_string(),
            attributes,
            status: RectificationStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        });
        Ok(id)
    }

    pub async fn counts(&self) -> (usize, usize, usize) {
        let subjects = self.subjects.read().await.len();
        let requests = self.requests.read().await;
        let processed = requests.iter().filter(|r| r.status.is_processed()).count();
        (subjects, requests.len() - processed, processed)
    }

    async fn requests_where(&self, processed: bool, page: &Page) -> Value {
        let requests = self.requests.read().await;
        let matching: Vec<&RectificationRequest> = requests
            .iter()
            .filter(|r| r.status.is_processed() == processed)
            .collect();
        paginate(matching.as_slice(), page)
    }
}

#[async_trait]
impl SubjectsService for MemorySubjects {
    async fn list_subjects(&self, page: Page) -> ControllerResult<Value> {
        let subjects = self.subjects.read().await;
        Ok(paginate(subjects.as_slice(), &page))
    }

    async fn list_rectification_requests(&self, page: Page) -> ControllerResult<Value> {
        Ok(self.requests_where(false, &page).await)
    }

    async fn list_processed_rectification_requests(&self, page: Page) -> ControllerResult<Value> {
        Ok(self.requests_where(true, &page).await)
    }

    async fn get_rectification_request(&self, id: u64) -> ControllerResult<Value> {
        let requests = self.requests.read().await;
        let request = requests
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ControllerError::NotFound(format!("Rectification request {} not found", id)))?;
        to_value(request)
    }

    async fn request_data_access(&self, subject_id: &str) -> ControllerResult<Value> {
        let subjects = self.subjects.read().await;
        let subject = subjects
            .iter()
            .find(|s| s.id == subject_id)
            .ok_or_else(|| ControllerError::NotFound(format!("Data subject {} not found", subject_id)))?;
        Ok(json!({ "subjectId": subject.id, "data": subject.data }))
    }

    async fn update_rectification_status(&self, id: u64, status: RectificationStatus) -> ControllerResult<Value> {
        if !status.is_processed() {
            return Err(ControllerError::Rejected(
                "Status must be either approved or denied".to_string(),
            ));
        }

        let mut requests = self.requests.write().await;
        let request = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ControllerError::NotFound(format!("Rectification request {} not found", id)))?;

        if request.status.is_processed() {
            return Err(ControllerError::Conflict(format!(
                "Rectification request {} was already {:?}",
                id, request.status
            )));
        }

        request.status = status;
        request.processed_at = Some(Utc::now());
        let value = to_value(&*request)?;
        let subject_id = request.subject_id.clone();
        let attributes = request.attributes.clone();
        drop(requests);

        // Approved rectifications overwrite the subject's stored attributes
        if status == RectificationStatus::Approved {
            let mut subjects = self.subjects.write().await;
            if let Some(subject) = subjects.iter_mut().find(|s| s.id == subject_id) {
                if let (Some(data), Some(changes)) = (subject.data.as_object_mut(), attributes.as_object()) {
                    for (key, value) in changes {
                        data.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        self.events.publish("RectificationStatusUpdated", value.clone()).await;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

struct StoredUser {
    account: UserAccount,
    salt: String,
    digest: String,
}

fn password_digest(salt: &str, password: &str) -> String {
    sha256_hex(&format!("{}:{}", salt, password))
}

impl StoredUser {
    fn new(account: UserAccount, password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = password_digest(&salt, password);
        Self { account, salt, digest }
    }

    fn set_password(&mut self, password: &str) {
        self.salt = Uuid::new_v4().simple().to_string();
        self.digest = password_digest(&self.salt, password);
    }

    fn verify(&self, password: &str) -> bool {
        password_digest(&self.salt, password) == self.digest
    }
}

pub struct MemoryUsers {
    users: RwLock<Vec<StoredUser>>,
    next_id: AtomicU64,
}

impl MemoryUsers {
    /// Optionally seed a bootstrap admin account
    pub fn new(admin: Option<(&str, &str)>) -> Self {
        let mut users = Vec::new();
        if let Some((email, password)) = admin {
            tracing::info!("Seeding bootstrap admin {}", email);
            users.push(StoredUser::new(
                UserAccount {
                    id: 1,
                    email: email.to_lowercase(),
                    first_name: "Admin".to_string(),
                    last_name: "User".to_string(),
                    role: "admin".to_string(),
                },
                password,
            ));
        }

        Self {
            next_id: AtomicU64::new(users.len() as u64 + 1),
            users: RwLock::new(users),
        }
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

fn may_manage(principal: &Principal, user_id: u64) -> bool {
    principal.user_id == user_id || principal.role == "admin"
}

#[async_trait]
impl UsersService for MemoryUsers {
    async fn authenticate(&self, email: &str, password: &str) -> ControllerResult<UserAccount> {
        let users = self.users.read().await;
        users
            .iter()
            .find(|u| u.account.email.eq_ignore_ascii_case(email) && u.verify(password))
            .map(|u| u.account.clone())
            .ok_or(ControllerError::InvalidCredentials)
    }

    async fn list(&self) -> ControllerResult<Vec<UserAccount>> {
        Ok(self.users.read().await.iter().map(|u| u.account.clone()).collect())
    }

    async fn register(&self, principal: &Principal, user: NewUser) -> ControllerResult<UserAccount> {
        if user.role == "admin" && principal.role != "admin" {
            return Err(ControllerError::Forbidden("Only admins may create admin accounts".to_string()));
        }

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.account.email.eq_ignore_ascii_case(&user.email)) {
            return Err(ControllerError::Conflict(format!("User {} already exists", user.email)));
        }

        let account = UserAccount {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            email: user.email.to_lowercase(),
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        };
        users.push(StoredUser::new(account.clone(), &user.password));
        Ok(account)
    }

    async fn update_password(&self, principal: &Principal, user_id: u64, password: &str) -> ControllerResult<()> {
        if !may_manage(principal, user_id) {
            return Err(ControllerError::Forbidden(
                "Only admins may change another user's password".to_string(),
            ));
        }

        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.account.id == user_id)
            .ok_or_else(|| ControllerError::NotFound(format!("User {} not found", user_id)))?;
        user.set_password(password);
        Ok(())
    }

    async fn remove(&self, principal: &Principal, user_id: u64) -> ControllerResult<()> {
        if principal.user_id == user_id {
            return Err(ControllerError::Rejected("Users cannot remove themselves".to_string()));
        }
        if !may_manage(principal, user_id) {
            return Err(ControllerError::Forbidden("Only admins may remove users".to_string()));
        }

        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.account.id != user_id);
        if users.len() == before {
            return Err(ControllerError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Data attribute configuration
// ---------------------------------------------------------------------------

pub struct MemoryData {
    config: RwLock<(Value, DateTime<Utc>)>,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            config: RwLock::new((json!({}), Utc::now())),
        }
    }
}

#[async_trait]
impl DataService for MemoryData {
    async fn attributes_config(&self) -> ControllerResult<Value> {
        let config = self.config.read().await;
        let (attributes, updated_at) = &*config;
        Ok(json!({ "attributes": attributes, "updatedAt": updated_at }))
    }

    async fn update_attributes_config(&self, attributes: Value) -> ControllerResult<Value> {
        if !attributes.is_object() {
            return Err(ControllerError::Rejected("attributes must be an object".to_string()));
        }

        let updated_at = Utc::now();
        *self.config.write().await = (attributes.clone(), updated_at);
        Ok(json!({ "attributes": attributes, "updatedAt": updated_at }))
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

pub struct MemoryStats {
    contract: Arc<MemoryContract>,
    subjects: Arc<MemorySubjects>,
    processors: Arc<MemoryProcessors>,
    users: Arc<MemoryUsers>,
    events: Arc<BroadcastEventSource>,
    history_limit: usize,
}

#[async_trait]
impl StatsService for MemoryStats {
    async fn stats(&self) -> ControllerResult<Value> {
        let (subjects, pending, processed) = self.subjects.counts().await;
        let latest_block = self.events.recent(1).await.first().map(|e| e.block_number);

        Ok(json!({
            "contractDeployed": self.contract.is_deployed().await,
            "processors": self.processors.count().await,
            "dataSubjects": subjects,
            "pendingRectificationRequests": pending,
            "processedRectificationRequests": processed,
            "users": self.users.count().await,
            "activeFeeds": self.events.active_registrations().await,
            "latestBlock": latest_block,
        }))
    }

    async fn events(&self) -> ControllerResult<Value> {
        to_value(&self.events.recent(self.history_limit).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::EventSource;
    use futures::StreamExt;

    fn admin() -> Principal {
        Principal {
            user_id: 1,
            email: "admin@example.com".to_string(),
            role: "admin".to_string(),
        }
    }

    fn page(page: u64, limit: u64) -> Page {
        Page { page, limit }
    }

    #[tokio::test]
    async fn deploy_publishes_and_only_once() {
        let events = Arc::new(BroadcastEventSource::default());
        let mut registration = events.register().await.unwrap();
        let contract = MemoryContract::new(events.clone());

        assert!(matches!(contract.details().await, Err(ControllerError::NotFound(_))));

        let deployed = contract
            .deploy(DeployContract {
                processors: vec!["0x0000000000000000000000000000000000000001".to_string()],
                data_subjects_can_update: None,
            })
            .await
            .unwrap();
        assert_eq!(deployed["dataSubjectsCanUpdate"], false);
        assert_eq!(deployed["address"].as_str().unwrap().len(), 42);

        let event = registration.events.next().await.unwrap().unwrap();
        assert_eq!(event.event, "ContractDeployed");

        let again = contract
            .deploy(DeployContract {
                processors: vec![],
                data_subjects_can_update: Some(true),
            })
            .await;
        assert!(matches!(again, Err(ControllerError::Conflict(_))));
    }

    #[tokio::test]
    async fn processors_reject_duplicate_addresses() {
        let processors = MemoryProcessors::new(Arc::new(BroadcastEventSource::default()));
        let new = || NewProcessor {
            name: "Acme".to_string(),
            eth_address: "0xAbC0000000000000000000000000000000000001".to_string(),
            scope: vec!["email".to_string()],
        };

        let added = processors.add(new()).await.unwrap();
        assert_eq!(added["id"], 1);
        assert!(matches!(processors.add(new()).await, Err(ControllerError::Conflict(_))));

        let updated = processors
            .update(ProcessorUpdate {
                id: 1,
                name: Some("Acme Ltd".to_string()),
                scope: None,
            })
            .await
            .unwrap();
        assert_eq!(updated["name"], "Acme Ltd");
        assert_eq!(updated["scope"], json!(["email"]));

        assert!(matches!(processors.remove(vec![1, 9]).await, Err(ControllerError::NotFound(_))));
        processors.remove(vec![1]).await.unwrap();
        assert_eq!(processors.count().await, 0);
    }

    #[tokio::test]
    async fn rectification_moves_to_the_archive_once() {
        let subjects = MemorySubjects::new(Arc::new(BroadcastEventSource::default()));
        subjects.add_subject("0xsubject", json!({ "name": "Ada", "city": "London" })).await;
        let id = subjects
            .submit_rectification("0xsubject", json!({ "city": "Paris" }))
            .await
            .unwrap();

        let pending = subjects.list_rectification_requests(page(1, 10)).await.unwrap();
        assert_eq!(pending["total"], 1);

        subjects
            .update_rectification_status(id, RectificationStatus::Approved)
            .await
            .unwrap();
        let again = subjects.update_rectification_status(id, RectificationStatus::Denied).await;
        assert!(matches!(again, Err(ControllerError::Conflict(_))));

        let archive = subjects.list_processed_rectification_requests(page(1, 10)).await.unwrap();
        assert_eq!(archive["total"], 1);
        assert_eq!(archive["items"][0]["status"], "approved");

        let data = subjects.request_data_access("0xsubject").await.unwrap();
        assert_eq!(data["data"]["city"], "Paris");
        assert_eq!(data["data"]["name"], "Ada");
    }

    #[tokio::test]
    async fn pagination_windows_the_list() {
        let subjects = MemorySubjects::new(Arc::new(BroadcastEventSource::default()));
        for n in 0..5 {
            subjects.add_subject(&format!("0x{}", n), json!({})).await;
        }

        let second = subjects.list_subjects(page(2, 2)).await.unwrap();
        assert_eq!(second["total"], 5);
        assert_eq!(second["items"].as_array().unwrap().len(), 2);
        assert_eq!(second["items"][0]["id"], "0x2");
    }

    #[tokio::test]
    async fn huge_page_numbers_yield_an_empty_window() {
        let subjects = MemorySubjects::new(Arc::new(BroadcastEventSource::default()));
        subjects.add_subject("0x1", json!({})).await;

        let listed = subjects.list_subjects(page(u64::MAX, 100)).await.unwrap();
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["items"].as_array().unwrap().len(), 0);
        assert_eq!(listed["page"], u64::MAX);
    }

    #[tokio::test]
    async fn users_authenticate_against_salted_digests() {
        let users = MemoryUsers::new(Some(("Admin@Example.com", "admin-password")));
        let account = users.authenticate("admin@example.com", "admin-password").await.unwrap();
        assert_eq!(account.role, "admin");
        assert!(matches!(
            users.authenticate("admin@example.com", "wrong").await,
            Err(ControllerError::InvalidCredentials)
        ));

        let created = users
            .register(&admin(), new_user("m@example.com", "manager"))
            .await
            .unwrap();
        assert_eq!(created.id, 2);

        users.update_password(&admin(), created.id, "second-password").await.unwrap();
        assert!(users.authenticate("m@example.com", "first-password").await.is_err());
        assert!(users.authenticate("m@example.com", "second-password").await.is_ok());
    }

    #[tokio::test]
    async fn managers_cannot_touch_other_accounts() {
        let users = MemoryUsers::new(Some(("admin@example.com", "admin-password")));
        let manager = Principal {
            user_id: 7,
            email: "m@example.com".to_string(),
            role: "manager".to_string(),
        };

        assert!(matches!(
            users.update_password(&manager, 1, "new-password").await,
            Err(ControllerError::Forbidden(_))
        ));
        assert!(matches!(users.remove(&manager, 1).await, Err(ControllerError::Forbidden(_))));
        assert!(matches!(users.remove(&admin(), 1).await, Err(ControllerError::Rejected(_))));
    }

    fn new_user(email: &str, role: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "New".to_string(),
            last_name: "User".to_string(),
            password: "first-password".to_string(),
            role: role.to_string(),
        }
    }

    #[tokio::test]
    async fn only_admins_create_admins() {
        let users = MemoryUsers::new(Some(("admin@example.com", "admin-password")));
        let manager = Principal {
            user_id: 7,
            email: "m@example.com".to_string(),
            role: "manager".to_string(),
        };

        assert!(matches!(
            users.register(&manager, new_user("boss@example.com", "admin")).await,
            Err(ControllerError::Forbidden(_))
        ));
        assert_eq!(users.count().await, 1);

        let peer = users.register(&manager, new_user("peer@example.com", "manager")).await.unwrap();
        assert_eq!(peer.role, "manager");
        let boss = users.register(&admin(), new_user("boss@example.com", "admin")).await.unwrap();
        assert_eq!(boss.role, "admin");
    }

    #[tokio::test]
    async fn stats_aggregate_across_stores() {
        let config = AppConfig::development();
        let events = Arc::new(BroadcastEventSource::default());
        let controllers = controllers(&config, events);

        controllers
            .processors
            .add(NewProcessor {
                name: "Acme".to_string(),
                eth_address: "0x0000000000000000000000000000000000000001".to_string(),
                scope: vec![],
            })
            .await
            .unwrap();

        let stats = controllers.stats.stats().await.unwrap();
        assert_eq!(stats["processors"], 1);
        assert_eq!(stats["users"], 1);
        assert_eq!(stats["contractDeployed"], false);
        assert_eq!(stats["latestBlock"], 1);

        let recent = controllers.stats.events().await.unwrap();
        assert_eq!(recent[0]["event"], "ProcessorAdded");
    }
}
