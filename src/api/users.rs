use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use crate::api::extract::Json;
use crate::api::response::{ok, ApiResponse};
use crate::api::state::AppState;
use crate::db::users::ProfileChanges;
use crate::error::AppError;
use crate::policy::Principal;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department_id: Option<i64>,
    pub graduation_year: Option<i32>,
    pub title: Option<String>,
}

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, AppError> {
    let profile = state
        .deadline
        .run(state.services.users.get_profile(&principal))
        .await?;
    Ok(ok(profile))
}

/// PUT /users/me
pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    let changes = ProfileChanges {
        first_name: req.first_name,
        last_name: req.last_name,
        department_id: req.department_id,
        graduation_year: req.graduation_year,
        title: req.title,
    };
    let profile = state
        .deadline
        .run(state.services.users.update_profile(&principal, changes))
        .await?;
    Ok(ok(profile))
}

/// POST /users/me/deactivate
pub async fn deactivate_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.users.deactivate(&principal))
        .await?;
    Ok(Json(ApiResponse::message("Account deactivated")))
}
