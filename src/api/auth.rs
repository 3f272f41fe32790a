use axum::{extract::State, response::Response, Extension};
use serde::{Deserialize, Serialize};

use crate::api::extract::{Json, Query};
use crate::api::response::{created, ok, ApiResponse};
use crate::api::state::AppState;
use crate::db::models::Role;
use crate::error::AppError;
use crate::policy::Principal;
use crate::service::credentials::{NewAccount, RoleProfile};
use crate::service::views::UserView;
use crate::service::TokenPair;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role_type: Role,
    pub department_id: Option<i64>,
    pub student_id: Option<String>,
    pub graduation_year: Option<i32>,
    pub title: Option<String>,
}

impl RegisterRequest {
    fn into_account(self) -> Result<NewAccount, AppError> {
        let profile = match self.role_type {
            Role::Student => RoleProfile::Student {
                student_id: self
                    .student_id
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| AppError::InvalidStudentId("Student ID is required".into()))?,
                graduation_year: self.graduation_year,
            },
            Role::Instructor => RoleProfile::Instructor { title: self.title },
        };
        Ok(NewAccount {
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            department_id: self.department_id,
            profile,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub tokens: TokenPair,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let account = req.into_account()?;
    let services = &state.services;
    let body = state
        .deadline
        .run(async {
            let (user, tokens) = services.auth.register(account).await?;
            let user = services.users.view(&user).await?;
            Ok(AuthResponse { user, tokens })
        })
        .await?;

    Ok(created(body))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let services = &state.services;
    let body = state
        .deadline
        .run(async {
            let (user, tokens) = services.auth.login(&req.email, &req.password).await?;
            let user = services.users.view(&user).await?;
            Ok(AuthResponse { user, tokens })
        })
        .await?;

    Ok(ok(body))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Response, AppError> {
    let tokens = state
        .deadline
        .run(state.services.auth.refresh(&req.refresh_token))
        .await?;
    Ok(ok(tokens))
}

/// POST /auth/logout (requires auth)
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.auth.logout(&principal))
        .await?;
    Ok(Json(ApiResponse::message("Logged out")))
}

/// GET /auth/verify-email?token=
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.auth.verify_email(&query.token))
        .await?;
    Ok(Json(ApiResponse::message("Email verified")))
}

/// POST /auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.auth.resend_verification(&req.email))
        .await?;
    Ok(Json(ApiResponse::message(
        "If the account exists and is unverified, a new link has been sent",
    )))
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.auth.forgot_password(&req.email))
        .await?;
    Ok(Json(ApiResponse::message(
        "If the account exists, a reset link has been sent",
    )))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(state.services.auth.reset_password(&req.token, &req.new_password))
        .await?;
    Ok(Json(ApiResponse::message("Password has been reset")))
}
