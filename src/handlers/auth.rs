use super::common::{created_response, success_response, JsonBody};
use crate::{
    auth::{AuthService, AuthUser},
    errors::{FieldErrors, ServiceError, FIELD_BLANK, FIELD_REQUIRED},
    services::{ProfilePayload, RegisterPayload, UserService},
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Login request payload
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Refresh token request
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Response of a successful refresh
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Presence check for credential fields; blank counts as missing.
fn require(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, FIELD_REQUIRED);
            None
        }
        Some(v) if v.is_empty() => {
            errors.add(field, FIELD_BLANK);
            None
        }
        Some(v) => Some(v),
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh_token))
}

/// Routes for the caller's own account; mount behind the auth middleware.
pub fn profile_routes() -> Router<AppState> {
    Router::new().route(
        "/profile/",
        get(get_profile).put(update_profile).patch(update_profile),
    )
}

/// Register a new account
pub async fn register(
    State(users): State<Arc<UserService>>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = users.register(payload).await?;
    Ok(created_response(created))
}

/// Exchange credentials for an access/refresh token pair
pub async fn login(
    State(auth): State<Arc<AuthService>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut errors = FieldErrors::new();
    let username = require(&mut errors, "username", payload.username);
    let password = require(&mut errors, "password", payload.password);
    errors.into_result()?;

    let (Some(username), Some(password)) = (username, password) else {
        return Err(ServiceError::InternalError("credential check fell through".to_string()));
    };

    let tokens = auth.login(&username, &password).await?;
    info!(username = %username, "Issued token pair");
    Ok(success_response(tokens))
}

/// Exchange a refresh token for a new access token
pub async fn refresh_token(
    State(auth): State<Arc<AuthService>>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut errors = FieldErrors::new();
    let refresh = require(&mut errors, "refresh", payload.refresh);
    errors.into_result()?;

    let Some(refresh) = refresh else {
        return Err(ServiceError::InternalError("refresh check fell through".to_string()));
    };

    let access = auth.refresh_access_token(&refresh).await?;
    Ok(success_response(AccessTokenResponse { access }))
}

/// The caller's profile
pub async fn get_profile(
    State(users): State<Arc<UserService>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = users.profile(user.user_id()).await?;
    Ok(success_response(profile))
}

/// Update the caller's email and names
pub async fn update_profile(
    State(users): State<Arc<UserService>>,
    user: AuthUser,
    JsonBody(payload): JsonBody<ProfilePayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = users.update_profile(user.user_id(), payload).await?;
    Ok(success_response(profile))
}
