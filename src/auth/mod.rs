use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::types::UserAccount;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: u64,
    pub email: String,
    pub role: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

/// Identity attached to a request once its bearer token has been verified.
/// Lives for a single request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: u64,
    pub email: String,
    pub role: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingCredential,

    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),

    #[error("token verification failed: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("role '{0}' is not allowed")]
    InsufficientRole(String),

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT secret is not configured")]
    InvalidSecret,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

/// Issues and verifies HS256 bearer tokens for management users.
pub struct CredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    expiry: Duration,
    allowed_roles: Vec<String>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("issuer", &self.issuer)
            .field("allowed_roles", &self.allowed_roles)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(security: &SecurityConfig) -> Result<Self, AuthError> {
        if security.jwt_secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        let secret = security.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[security.jwt_issuer.as_str()]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: security.jwt_issuer.clone(),
            expiry: Duration::hours(security.jwt_expiry_hours as i64),
            allowed_roles: security.allowed_roles.clone(),
        })
    }

    pub fn issue(&self, account: &UserAccount) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account.id.to_string(),
            user_id: account.id,
            email: account.email.clone(),
            role: account.role.clone(),
            iss: self.issuer.clone(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };

        self.sign(&claims).map(|token| IssuedToken {
            token,
            expires_in: self.expiry.num_seconds(),
        })
    }

    /// Sign arbitrary claims with the configured key.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    /// Verify the `Authorization: Bearer` header and derive the principal.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_bearer_token(headers)?;
        self.verify_token(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let principal = Principal::from(token_data.claims);

        if !self.allowed_roles.iter().any(|role| role == &principal.role) {
            return Err(AuthError::InsufficientRole(principal.role));
        }

        Ok(principal)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

/// Extract JWT token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MalformedCredential("header is not valid ASCII"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedCredential("expected Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MalformedCredential("empty token"));
    }

    Ok(token)
}
