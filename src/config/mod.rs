use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
    /// Roles admitted by the blanket credential gate. Anything else is 403.
    pub allowed_roles: Vec<String>,
    pub cors_origins: Vec<String>,
    /// Seed account for the in-memory user store.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Whether `/management/events/feed` verifies a bearer token before upgrading.
    pub require_auth: bool,
    pub registration_timeout_ms: u64,
    pub channel_capacity: usize,
    pub history_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("CG_MANAGEMENT_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env::var("CG_MANAGEMENT_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ALLOWED_ROLES") {
            self.security.allowed_roles = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.security.admin_email = Some(v);
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            self.security.admin_password = Some(v);
        }

        // Feed overrides
        if let Ok(v) = env::var("FEED_REQUIRE_AUTH") {
            self.feed.require_auth = v.parse().unwrap_or(self.feed.require_auth);
        }
        if let Ok(v) = env::var("FEED_REGISTRATION_TIMEOUT_MS") {
            self.feed.registration_timeout_ms = v.parse().unwrap_or(self.feed.registration_timeout_ms);
        }
        if let Ok(v) = env::var("FEED_CHANNEL_CAPACITY") {
            self.feed.channel_capacity = v.parse().unwrap_or(self.feed.channel_capacity);
        }
        if let Ok(v) = env::var("FEED_HISTORY_LIMIT") {
            self.feed.history_limit = v.parse().unwrap_or(self.feed.history_limit);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 4000,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                jwt_issuer: "cg-management".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                allowed_roles: vec!["admin".to_string(), "manager".to_string()],
                cors_origins: vec!["http://localhost:3000".to_string()],
                admin_email: Some("admin@example.com".to_string()),
                admin_password: Some("admin-password".to_string()),
            },
            feed: FeedConfig {
                require_auth: false,
                registration_timeout_ms: 5_000,
                channel_capacity: 1024,
                history_limit: 100,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 4000,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "cg-management".to_string(),
                jwt_expiry_hours: 24,
                allowed_roles: vec!["admin".to_string(), "manager".to_string()],
                cors_origins: vec!["https://staging.example.com".to_string()],
                admin_email: None,
                admin_password: None,
            },
            feed: FeedConfig {
                require_auth: false,
                registration_timeout_ms: 5_000,
                channel_capacity: 1024,
                history_limit: 100,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 4000,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "cg-management".to_string(),
                jwt_expiry_hours: 4,
                allowed_roles: vec!["admin".to_string(), "manager".to_string()],
                cors_origins: vec!["https://app.example.com".to_string()],
                admin_email: None,
                admin_password: None,
            },
            feed: FeedConfig {
                require_auth: false,
                registration_timeout_ms: 3_000,
                channel_capacity: 4096,
                history_limit: 500,
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
