//! Marketplace HTTP endpoints.
//!
//! Thin handlers over [`protoboard_core::MarketplaceService`]. The caller's
//! identity comes from the `x-user-id` header; full authentication sits in
//! front of this service. Store failures reach clients as a generic message
//! only.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use protoboard_core::marketplace::MarketplaceError;
use protoboard_core::{Project, ProjectDraft};
use serde_json::json;
use std::sync::Arc;

use crate::ServerState;

/// API-level errors, mapped onto HTTP statuses.
pub enum ApiError {
    MissingIdentity,
    Marketplace(MarketplaceError),
}

impl From<MarketplaceError> for ApiError {
    fn from(e: MarketplaceError) -> Self {
        Self::Marketplace(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                "missing x-user-id header".to_string(),
            ),
            ApiError::Marketplace(e) => {
                let status = match &e {
                    MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
                    MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
                    // The underlying detail was already logged where it
                    // happened; clients get the generic message.
                    MarketplaceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                // MarketplaceError's Display is already client-safe.
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Extract the caller's identity from the `x-user-id` header.
fn user_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or(ApiError::MissingIdentity)
}

/// `GET /projects`: list published projects.
pub async fn list_projects(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.marketplace.list_published().await?))
}

/// `GET /projects/{id}`: fetch a single project.
pub async fn get_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.marketplace.get(&id).await?))
}

/// `POST /projects`: save a draft without changing publication state.
pub async fn save_project(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(draft): Json<ProjectDraft>,
) -> Result<Json<Project>, ApiError> {
    let user = user_from_headers(&headers)?;
    Ok(Json(state.marketplace.save(&user, draft).await?))
}

/// `POST /projects/publish`: publish a draft (create or update in place).
pub async fn publish_project(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(draft): Json<ProjectDraft>,
) -> Result<Json<Project>, ApiError> {
    let user = user_from_headers(&headers)?;
    Ok(Json(state.marketplace.publish(&user, draft).await?))
}

/// `POST /projects/{id}/unpublish`: remove a project from the listing.
pub async fn unpublish_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Project>, ApiError> {
    let user = user_from_headers(&headers)?;
    Ok(Json(state.marketplace.unpublish(&user, &id).await?))
}

/// `POST /projects/{id}/clone`: fork a project into a new owned copy.
pub async fn clone_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Project>, ApiError> {
    let user = user_from_headers(&headers)?;
    Ok(Json(state.marketplace.clone_project(&user, &id).await?))
}

/// `DELETE /projects/{id}`: delete an owned project.
pub async fn delete_project(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = user_from_headers(&headers)?;
    state.marketplace.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(user_from_headers(&headers).is_err());

        headers.insert("x-user-id", "ada".parse().unwrap());
        assert_eq!(user_from_headers(&headers).unwrap(), "ada");
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "".parse().unwrap());
        assert!(user_from_headers(&headers).is_err());
    }
}
