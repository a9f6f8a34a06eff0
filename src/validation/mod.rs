// Declarative request validation
//
// A Schema lists the fields a route expects in its path, query and body.
// Validation checks every rule and reports every violated field at once;
// on success the request is rewritten with coerced values and defaults.

pub mod schemas;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::request::ManagementRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Path,
    Query,
    Body,
}

/// One violated constraint, reported back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub location: Location,
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(location: Location, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location,
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text { min: usize, max: usize },
    Email,
    /// `0x`-prefixed, 20-byte hex account address
    EthAddress,
    Integer { min: Option<i64>, max: Option<i64> },
    Boolean,
    OneOf(&'static [&'static str]),
    ListOf { item: Box<FieldKind>, min_items: usize },
    Object,
}

impl FieldKind {
    pub fn text(min: usize, max: usize) -> Self {
        FieldKind::Text { min, max }
    }

    pub fn id() -> Self {
        FieldKind::Integer { min: Some(1), max: None }
    }

    pub fn integer(min: i64, max: i64) -> Self {
        FieldKind::Integer { min: Some(min), max: Some(max) }
    }

    pub fn list_of(item: FieldKind, min_items: usize) -> Self {
        FieldKind::ListOf { item: Box::new(item), min_items }
    }

    /// Check a value and return its normalized form.
    ///
    /// Path and query values are always strings, so numbers and booleans are
    /// accepted in their string spelling too.
    fn check(&self, value: &Value) -> Result<Value, String> {
        match self {
            FieldKind::Text { min, max } => {
                let s = value.as_str().ok_or("must be a string")?;
                let len = s.chars().count();
                if len < *min || len > *max {
                    return Err(format!("must be between {} and {} characters", min, max));
                }
                Ok(Value::String(s.to_string()))
            }
            FieldKind::Email => {
                let s = value.as_str().ok_or("must be a string")?.trim();
                if !is_email(s) {
                    return Err("must be a valid email address".to_string());
                }
                Ok(Value::String(s.to_lowercase()))
            }
            FieldKind::EthAddress => {
                let s = value.as_str().ok_or("must be a string")?;
                if !is_eth_address(s) {
                    return Err("must be a valid Ethereum address".to_string());
                }
                Ok(Value::String(s.to_string()))
            }
            FieldKind::Integer { min, max } => {
                let n = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or("must be an integer")?;

                match (min, max) {
                    (Some(min), Some(max)) if n < *min || n > *max => {
                        Err(format!("must be between {} and {}", min, max))
                    }
                    (Some(min), None) if n < *min => Err(format!("must be at least {}", min)),
                    (None, Some(max)) if n > *max => Err(format!("must be at most {}", max)),
                    _ => Ok(Value::Number(Number::from(n))),
                }
            }
            FieldKind::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) if s == "true" => Ok(Value::Bool(true)),
                Value::String(s) if s == "false" => Ok(Value::Bool(false)),
                _ => Err("must be a boolean".to_string()),
            },
            FieldKind::OneOf(allowed) => {
                let s = value.as_str().ok_or("must be a string")?;
                if !allowed.contains(&s) {
                    return Err(format!("must be one of: {}", allowed.join(", ")));
                }
                Ok(Value::String(s.to_string()))
            }
            FieldKind::ListOf { item, min_items } => {
                let items = value.as_array().ok_or("must be an array")?;
                if items.len() < *min_items {
                    return Err(format!("must contain at least {} item(s)", min_items));
                }
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| item.check(v).map_err(|msg| format!("item {} {}", i, msg)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            FieldKind::Object => match value {
                Value::Object(_) => Ok(value.clone()),
                _ => Err("must be an object".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub location: Location,
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldRule {
    pub fn path(name: &'static str, kind: FieldKind) -> Self {
        Self::new(Location::Path, name, kind)
    }

    pub fn query(name: &'static str, kind: FieldKind) -> Self {
        Self::new(Location::Query, name, kind)
    }

    pub fn body(name: &'static str, kind: FieldKind) -> Self {
        Self::new(Location::Body, name, kind)
    }

    fn new(location: Location, name: &'static str, kind: FieldKind) -> Self {
        Self {
            location,
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Optional field filled with `value` when absent
    pub fn or_default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }
}

/// Expected shape of one route's request.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub rules: Vec<FieldRule>,
}

impl Schema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rules: Vec::new(),
        }
    }

    pub fn field(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validate the request and, only if every rule passes, write the
    /// normalized values back. A rejected request is left untouched.
    pub fn apply(&self, request: &mut ManagementRequest) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();
        let mut params = request.params.clone();
        let mut query = request.query.clone();

        let expects_body = self.rules.iter().any(|r| r.location == Location::Body);
        let mut body = match &request.body {
            Value::Object(map) => Some(map.clone()),
            Value::Null => Some(Map::new()),
            _ => None,
        };

        if expects_body && body.is_none() {
            violations.push(FieldViolation::new(Location::Body, "body", "must be a JSON object"));
        }

        for rule in &self.rules {
            let target = match rule.location {
                Location::Path => Some(&mut params),
                Location::Query => Some(&mut query),
                Location::Body => body.as_mut(),
            };
            let Some(target) = target else {
                continue;
            };

            match target.get(rule.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &rule.default {
                        target.insert(rule.name.to_string(), default.clone());
                    } else if rule.required {
                        violations.push(FieldViolation::new(rule.location, rule.name, "is required"));
                    }
                }
                Some(value) => match rule.kind.check(value) {
                    Ok(normalized) => {
                        target.insert(rule.name.to_string(), normalized);
                    }
                    Err(message) => {
                        violations.push(FieldViolation::new(rule.location, rule.name, message));
                    }
                },
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        request.params = params;
        request.query = query;
        if expects_body {
            if let Some(body) = body {
                request.body = Value::Object(body);
            }
        }
        Ok(())
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

fn is_eth_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
