//! Generic list/detail handlers shared by every [`CrudService`] resource.

use super::common::{
    created_response, no_content_response, success_response, JsonBody, PathId,
};
use crate::{
    errors::ServiceError,
    services::{CrudService, WriteMode},
    AppState,
};
use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;

/// List every record of the resource
pub async fn list<S: CrudService>(
    State(service): State<Arc<S>>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = service.list().await?;
    Ok(success_response(records))
}

/// Create a record
pub async fn create<S: CrudService>(
    State(service): State<Arc<S>>,
    JsonBody(payload): JsonBody<S::Payload>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = service.create(payload).await?;
    Ok(created_response(record))
}

/// Get a record by ID
pub async fn retrieve<S: CrudService>(
    State(service): State<Arc<S>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ServiceError> {
    let record = service.get(id).await?;
    Ok(success_response(record))
}

/// Replace a record (PUT)
pub async fn replace<S: CrudService>(
    State(service): State<Arc<S>>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<S::Payload>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = service.update(id, payload, WriteMode::Full).await?;
    Ok(success_response(record))
}

/// Partially update a record (PATCH)
pub async fn patch<S: CrudService>(
    State(service): State<Arc<S>>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<S::Payload>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = service.update(id, payload, WriteMode::Partial).await?;
    Ok(success_response(record))
}

/// Delete a record
pub async fn destroy<S: CrudService>(
    State(service): State<Arc<S>>,
    PathId(id): PathId,
) -> Result<impl IntoResponse, ServiceError> {
    service.delete(id).await?;
    Ok(no_content_response())
}

/// Collection and detail routes for one resource.
pub fn crud_routes<S>(collection_path: &str, detail_path: &str) -> Router<AppState>
where
    S: CrudService,
    Arc<S>: FromRef<AppState>,
{
    Router::new()
        .route(collection_path, get(list::<S>).post(create::<S>))
        .route(
            detail_path,
            get(retrieve::<S>)
                .put(replace::<S>)
                .patch(patch::<S>)
                .delete(destroy::<S>),
        )
}
