// Per-route request schemas. Each function is a pure description of one
// route's input; nothing here holds state.

use serde_json::json;

use super::{FieldKind, FieldRule, Schema};

const MAX_PAGE_SIZE: i64 = 100;
const MIN_PASSWORD_LENGTH: usize = 8;

const RECTIFICATION_DECISIONS: &[&str] = &["approved", "denied"];

fn pagination(schema: Schema) -> Schema {
    schema
        .field(FieldRule::query("page", FieldKind::Integer { min: Some(1), max: None }).or_default(json!(1)))
        .field(FieldRule::query("limit", FieldKind::integer(1, MAX_PAGE_SIZE)).or_default(json!(10)))
}

fn password() -> FieldKind {
    FieldKind::text(MIN_PASSWORD_LENGTH, 128)
}

// contract

pub fn contract_deploy() -> Schema {
    Schema::new("contract-deploy")
        .field(FieldRule::body("processors", FieldKind::list_of(FieldKind::EthAddress, 0)))
        .field(FieldRule::body("dataSubjectsCanUpdate", FieldKind::Boolean).or_default(json!(true)))
}

// processors

pub fn add_processor() -> Schema {
    Schema::new("add-processor")
        .field(FieldRule::body("name", FieldKind::text(1, 100)))
        .field(FieldRule::body("ethAddress", FieldKind::EthAddress))
        .field(FieldRule::body("scope", FieldKind::list_of(FieldKind::text(1, 64), 1)))
}

pub fn update_processor() -> Schema {
    Schema::new("update-processor")
        .field(FieldRule::body("id", FieldKind::id()))
        .field(FieldRule::body("name", FieldKind::text(1, 100)).optional())
        .field(FieldRule::body("scope", FieldKind::list_of(FieldKind::text(1, 64), 1)).optional())
}

pub fn delete_processor() -> Schema {
    Schema::new("delete-processor").field(FieldRule::body("ids", FieldKind::list_of(FieldKind::id(), 1)))
}

#[cfg(feature = "test-routes")]
pub fn test_add_processor() -> Schema {
    Schema::new("test-add-processor")
        .field(FieldRule::body("ethAddress", FieldKind::EthAddress))
        .field(FieldRule::body("name", FieldKind::text(1, 100)).optional())
}

#[cfg(feature = "test-routes")]
pub fn test_delete_processors() -> Schema {
    Schema::new("test-delete-processors")
        .field(FieldRule::body("ethAddresses", FieldKind::list_of(FieldKind::EthAddress, 1)))
}

// subjects

pub fn list_subjects() -> Schema {
    pagination(Schema::new("list-subjects"))
}

pub fn list_rectification_requests() -> Schema {
    pagination(Schema::new("list-rectification-requests"))
}

pub fn get_rectification() -> Schema {
    Schema::new("get-rectification").field(FieldRule::path("rectificationRequestId", FieldKind::id()))
}

pub fn update_rectification_status() -> Schema {
    Schema::new("update-rectification-status")
        .field(FieldRule::path("rectificationRequestId", FieldKind::id()))
        .field(FieldRule::body("status", FieldKind::OneOf(RECTIFICATION_DECISIONS)))
}

// users

pub fn users_login() -> Schema {
    Schema::new("users-login")
        .field(FieldRule::body("email", FieldKind::Email))
        .field(FieldRule::body("password", FieldKind::text(1, 128)))
}

pub fn users_registration() -> Schema {
    Schema::new("users-registration")
        .field(FieldRule::body("email", FieldKind::Email))
        .field(FieldRule::body("firstName", FieldKind::text(1, 64)))
        .field(FieldRule::body("lastName", FieldKind::text(1, 64)))
        .field(FieldRule::body("password", password()))
        .field(FieldRule::body("role", FieldKind::OneOf(&["admin", "manager"])).or_default(json!("manager")))
}

pub fn users_removal() -> Schema {
    Schema::new("users-removal").field(FieldRule::path("userId", FieldKind::id()))
}

pub fn users_update_password() -> Schema {
    Schema::new("users-update-password")
        .field(FieldRule::path("userId", FieldKind::id()))
        .field(FieldRule::body("password", password()))
}

// data

pub fn update_attributes_config() -> Schema {
    Schema::new("update-attributes-config").field(FieldRule::body("attributes", FieldKind::Object))
}
