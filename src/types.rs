//! Shared types passed between handlers and domain controllers

use serde::{Deserialize, Serialize};

/// Management user as seen by the gateway. Password material never leaves the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: u64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "manager".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordUpdate {
    pub password: String,
}

/// Pagination window for list operations. Defaults are applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    /// Saturates instead of overflowing; a window past the end is simply empty
    pub fn offset(&self) -> usize {
        let skipped = self.page.saturating_sub(1).saturating_mul(self.limit);
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployContract {
    pub processors: Vec<String>,
    #[serde(default)]
    pub data_subjects_can_update: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProcessor {
    pub name: String,
    pub eth_address: String,
    pub scope: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorUpdate {
    pub id: u64,
    pub name: Option<String>,
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveProcessors {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProcessor {
    pub eth_address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRemoveProcessors {
    pub eth_addresses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RectificationStatus {
    Pending,
    Approved,
    Denied,
}

impl RectificationStatus {
    pub fn is_processed(&self) -> bool {
        !matches!(self, RectificationStatus::Pending)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RectificationStatusUpdate {
    pub status: RectificationStatus,
}
