/*!
 * # Authentication and Authorization Module
 *
 * JWT (HS256) bearer tokens for RetailX staff accounts. A token carries the
 * account's role (`admin`, `manager` or `cashier`) and routes are guarded by
 * role with [`AuthRouterExt`]. Logout revokes a token by its `jti` through an
 * in-memory blacklist that forgets entries once the token would have expired
 * anyway.
 */

pub mod password;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::account;

pub use password::{hash_password, verify_password};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Account ID
    pub name: Option<String>,  // Full name
    pub email: Option<String>, // Account e-mail
    pub username: String,
    pub roles: Vec<String>,
    pub jti: String, // Token ID, used for revocation
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated account extracted from a validated bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: String,
    pub roles: Vec<String>,
    pub token_id: String,
    pub expires_at: i64,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            username: claims.username,
            roles: claims.roles,
            token_id: claims.jti,
            expires_at: claims.exp,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
        )
    }
}

/// Access token handed back on login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssuedToken {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Issues, validates and revokes access tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Mint an access token for an account; the role becomes the token's only role.
    pub fn issue_token(&self, account: &account::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.config.access_token_expiration)
            .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let exp = now + lifetime;

        let claims = Claims {
            sub: account.id.to_string(),
            name: Some(account.full_name.clone()),
            email: Some(account.email.clone()),
            username: account.username.clone(),
            roles: vec![account.role.to_string()],
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: lifetime.num_seconds(),
        })
    }

    /// Validate a JWT and extract its claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revoke a token until its natural expiry
    pub async fn revoke_token(&self, token_id: &str, expires_at: i64) {
        let expiry = DateTime::<Utc>::from_timestamp(expires_at, 0).unwrap_or_else(Utc::now);

        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken {
            jti: token_id.to_string(),
            expiry,
        });
        Self::clean_blacklist(&mut blacklist);
        debug!(jti = %token_id, "token revoked");
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }

    fn clean_blacklist(blacklist: &mut Vec<BlacklistedToken>) {
        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
    }

    #[cfg(test)]
    async fn blacklist_len(&self) -> usize {
        self.blacklisted_tokens.read().await.len()
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = self.parts();
        if status.is_server_error() {
            warn!(error = %self, "authentication failure");
        }

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Returns the bearer token from an `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Makes the [`AuthService`] reachable from `auth_middleware` on every route.
pub async fn inject_auth_service(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth_service);
    next.run(request).await
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => return AuthError::MissingAuth.into_response(),
    };

    match auth_service.validate_token(&token).await {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser::from(claims));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects the request unless the caller holds one of the allowed roles
pub async fn role_middleware(
    State(allowed_roles): State<Vec<String>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_any_role(&allowed_roles) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: &str) -> Self;
    fn with_any_role(self, roles: &[&str]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &str) -> Self {
        self.with_any_role(&[role])
    }

    fn with_any_role(self, roles: &[&str]) -> Self {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        self.layer(axum::middleware::from_fn_with_state(roles, role_middleware))
            .with_auth()
    }
}
