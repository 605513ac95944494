/*!
 * # Authentication and Authorization Module
 *
 * JWT based authentication for the market prices API:
 *
 * - username/password login issuing an access/refresh token pair
 * - refresh tokens exchanged for new access tokens
 * - bearer-token middleware that loads the calling user from the database
 * - an optional staff gate for account administration
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;
use crate::errors::ServiceError;

pub mod password;
pub mod password_policy;

pub use password::{hash_password, verify_dummy_password, verify_password};
pub use password_policy::{PasswordPolicy, PasswordPolicyError};

/// Distinguishes the two kinds of token sharing one signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub token_type: TokenType, // access or refresh
    pub jti: String,           // JWT ID (unique identifier for this token)
    pub iat: i64,              // Issued at time
    pub exp: i64,              // Expiration time
    pub nbf: i64,              // Not valid before time
    pub iss: String,           // Issuer
    pub aud: String,           // Audience
}

/// Authenticated caller, loaded from the database for every request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
    pub token_id: String,
}

impl AuthUser {
    pub fn user_id(&self) -> i32 {
        self.user.id
    }

    /// Staff and superusers may administer accounts when the staff gate is on
    pub fn is_staff(&self) -> bool {
        self.user.is_staff || self.user.is_superuser
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.access_token_lifetime_secs),
            Duration::from_secs(cfg.refresh_token_lifetime_secs),
        )
    }
}

/// Access/refresh pair returned by login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Authentication service that handles credential checks and token issuance
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Checks username and password, returning the active account.
    ///
    /// Unknown users, wrong passwords and inactive accounts are
    /// indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?;

        let Some(found) = found else {
            verify_dummy_password(password);
            debug!(username, "login attempt for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &found.password_hash) {
            debug!(user_id = found.id, "login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !found.is_active {
            debug!(user_id = found.id, "login attempt for inactive user");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(found)
    }

    /// Issues a fresh token pair and stamps `last_login`
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let account = self.authenticate(username, password).await?;
        let tokens = self.generate_token(&account)?;

        let user_id = account.id;
        let mut active = account.into_active_model();
        active.last_login = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        info!(user_id, "user logged in");
        Ok(tokens)
    }

    fn encode_claims(&self, user_id: i32, token_type: TokenType) -> Result<String, AuthError> {
        let lifetime = match token_type {
            TokenType::Access => self.config.access_token_expiration,
            TokenType::Refresh => self.config.refresh_token_expiration,
        };
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(lifetime)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Generate an access/refresh token pair for a user
    pub fn generate_token(&self, account: &user::Model) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.encode_claims(account.id, TokenType::Access)?,
            refresh: self.encode_claims(account.id, TokenType::Refresh)?,
        })
    }

    /// Validate a JWT and check that it is of the expected type
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!("token rejected: {}", e);
            AuthError::InvalidToken
        })?
        .claims;

        if claims.token_type != expected {
            debug!(jti = %claims.jti, "token of the wrong type presented");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    async fn load_active_user(&self, claims: &Claims) -> Result<user::Model, AuthError> {
        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        match user::Entity::find_by_id(user_id).one(&*self.db).await? {
            Some(account) if account.is_active => Ok(account),
            Some(_) => Err(AuthError::InactiveUser),
            None => Err(AuthError::UserNotFound),
        }
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(refresh_token, TokenType::Refresh)?;
        let account = self
            .load_active_user(&claims)
            .await
            .map_err(|e| match e {
                AuthError::Database(_) => e,
                _ => AuthError::InvalidToken,
            })?;
        self.encode_claims(account.id, TokenType::Access)
    }

    /// Resolve a bearer access token into the calling user
    pub async fn authenticate_bearer(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token, TokenType::Access)?;
        let account = self.load_active_user(&claims).await?;
        Ok(AuthUser {
            user: account,
            token_id: claims.jti,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication credentials were not provided.")]
    MissingAuth,

    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("User is inactive")]
    InactiveUser,

    #[error("You do not have permission to perform this action.")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::UserNotFound
            | AuthError::InactiveUser => ServiceError::Unauthorized(err.to_string()),
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::TokenError(msg),
            AuthError::Database(e) => ServiceError::DatabaseError(e),
            AuthError::ServiceUnavailable => ServiceError::InternalError(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
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

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("Bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Authentication middleware that validates the bearer token and loads the user
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            warn!("auth middleware used without an AuthService extension");
            return AuthError::ServiceUnavailable.into_response();
        }
    };

    let Some(token) = bearer_token(request.headers()) else {
        return AuthError::MissingAuth.into_response();
    };

    match auth_service.authenticate_bearer(token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects callers that are neither staff nor superuser
pub async fn staff_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.is_staff() {
        debug!(user_id = user.user_id(), "non-staff user denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_staff(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_staff(self) -> Self {
        self.layer(axum::middleware::from_fn(staff_middleware))
            .with_auth()
    }
}
