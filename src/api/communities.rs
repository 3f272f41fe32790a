use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use crate::api::extract::{Json, Path, Query};
use crate::api::multipart::Form;
use crate::api::response::{created, no_content, ok};
use crate::api::state::AppState;
use crate::db::communities::CommunityChanges;
use crate::db::Page;
use crate::error::AppError;
use crate::policy::Principal;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommunityRequest {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub lead_user_id: Option<i64>,
}

/// POST /communities
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateCommunityRequest>,
) -> Result<Response, AppError> {
    let community = state
        .deadline
        .run(
            state
                .services
                .communities
                .create(&principal, &req.name, &req.abbreviation),
        )
        .await?;
    Ok(created(community))
}

/// GET /communities
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let communities = state
        .deadline
        .run(state.services.communities.list(&principal, query.page()))
        .await?;
    Ok(ok(communities))
}

/// GET /communities/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let community = state
        .deadline
        .run(state.services.communities.get(&principal, id))
        .await?;
    Ok(ok(community))
}

/// PUT /communities/:id (lead only; `leadUserId` transfers the role)
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCommunityRequest>,
) -> Result<Response, AppError> {
    let changes = CommunityChanges {
        name: req.name,
        abbreviation: req.abbreviation,
        lead_user_id: req.lead_user_id,
    };
    let community = state
        .deadline
        .run(state.services.communities.update(&principal, id, changes))
        .await?;
    Ok(ok(community))
}

/// DELETE /communities/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .deadline
        .run(state.services.communities.delete(&principal, id))
        .await?;
    Ok(no_content())
}

/// PUT /communities/:id/profile-photo (multipart: `file`)
pub async fn update_profile_photo(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    mut form: Form,
) -> Result<Response, AppError> {
    let upload = form
        .take_file("file")?
        .ok_or_else(|| AppError::validation("file", "file is required"))?;
    let community = state
        .deadline
        .run(
            state
                .services
                .communities
                .update_profile_photo(&principal, id, upload),
        )
        .await?;
    Ok(ok(community))
}

/// DELETE /communities/:id/profile-photo
pub async fn delete_profile_photo(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let community = state
        .deadline
        .run(state.services.communities.delete_profile_photo(&principal, id))
        .await?;
    Ok(ok(community))
}

/// GET /communities/:id/participants
pub async fn participants(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let participants = state
        .deadline
        .run(
            state
                .services
                .communities
                .participants(&principal, id, query.page()),
        )
        .await?;
    Ok(ok(participants))
}

/// POST /communities/:id/participants
pub async fn join(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let participation = state
        .deadline
        .run(state.services.communities.join(&principal, id))
        .await?;
    Ok(ok(participation))
}

/// DELETE /communities/:id/participants
pub async fn leave(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .deadline
        .run(state.services.communities.leave(&principal, id))
        .await?;
    Ok(no_content())
}

/// GET /communities/:id/participants/check
pub async fn check_participation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let participation = state
        .deadline
        .run(state.services.communities.check_participation(&principal, id))
        .await?;
    Ok(ok(participation))
}
