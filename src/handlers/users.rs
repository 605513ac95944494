use super::common::{
    created_response, no_content_response, success_response, JsonBody, PathId,
};
use crate::{
    errors::ServiceError,
    services::{UserPayload, UserService, WriteMode},
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;

/// Account administration routes; mount behind the auth middleware.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route(
            "/users/:id/",
            get(get_user)
                .put(replace_user)
                .patch(patch_user)
                .delete(delete_user),
        )
}

/// List all users
pub async fn list_users(
    State(users): State<Arc<UserService>>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(users.list().await?))
}

/// Create a new user
pub async fn create_user(
    State(users): State<Arc<UserService>>,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = users.create(payload).await?;
    Ok(created_response(user))
}

/// Get a user by ID
pub async fn get_user(
    State(users): State<Arc<UserService>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(users.get(id).await?))
}

/// Replace a user
pub async fn replace_user(
    State(users): State<Arc<UserService>>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = users.update(id, payload, WriteMode::Full).await?;
    Ok(success_response(user))
}

/// Partially update a user
pub async fn patch_user(
    State(users): State<Arc<UserService>>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<UserPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = users.update(id, payload, WriteMode::Partial).await?;
    Ok(success_response(user))
}

/// Delete a user
pub async fn delete_user(
    State(users): State<Arc<UserService>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ServiceError> {
    users.delete(id).await?;
    Ok(no_content_response())
}
