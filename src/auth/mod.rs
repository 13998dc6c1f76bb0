use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Department classification supplied by the identity provider. Drives
/// notification targeting and the capability checks below.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    #[strum(serialize = "engineer")]
    Engineer,
    #[strum(serialize = "regional_manager")]
    RegionalManager,
    #[strum(serialize = "store_manager")]
    StoreManager,
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Display name
    pub name: String,
    pub email: Option<String>,
    pub department: Department,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub department: Department,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            department: claims.department,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::Unauthorized(err.to_string())
    }
}

/// Verifies bearer tokens for incoming requests.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(AuthUser::from(data.claims))
    }
}

/// Issues an HS256 token for the given identity, valid for `ttl_secs`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    name: &str,
    email: Option<&str>,
    department: Department,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.to_string(),
        email: email.map(|e| e.to_string()),
        department,
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Middleware requiring a valid bearer token; the decoded identity is made
/// available to handlers through request extensions.
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let user = verifier.verify(token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Mutation entry points guarded by the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    View,
    Update,
    Approve,
    Reject,
    MarkSent,
    ConfirmReceipt,
    Delete,
}

/// Single capability-check function invoked by every mutation entry point.
/// Approvals, rejections and deletes belong to regional managers, dispatch
/// to store managers; receipt confirmation to engineers (and store managers,
/// for the MRC return flow).
pub fn authorize(department: Department, operation: Operation) -> Result<(), ServiceError> {
    use Department::*;
    use Operation::*;

    let allowed = match operation {
        Create | View | Update => true,
        Approve | Reject | Delete => department == RegionalManager,
        MarkSent => department == StoreManager,
        ConfirmReceipt => matches!(department, Engineer | StoreManager),
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "{} may not perform this operation",
            department
        )))
    }
}
