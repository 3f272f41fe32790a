use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use crate::api::extract::{Json, Path, Query};
use crate::api::multipart::Form;
use crate::api::response::{created, ok, ApiResponse};
use crate::api::state::AppState;
use crate::error::AppError;
use crate::policy::Principal;
use crate::service::chat::MessageWindow;

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetMessagesQuery {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<i64>,
    pub sender: Option<i64>,
}

/// POST /communities/:id/chat/text
pub async fn send_text(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(community_id): Path<i64>,
    Json(req): Json<SendTextRequest>,
) -> Result<Response, AppError> {
    let message = state
        .deadline
        .run(
            state
                .services
                .chat
                .send_text(&principal, community_id, &req.content),
        )
        .await?;
    Ok(created(message))
}

/// POST /communities/:id/chat/file (multipart: `file` + optional `content` caption)
pub async fn send_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(community_id): Path<i64>,
    mut form: Form,
) -> Result<Response, AppError> {
    let upload = form
        .take_file("file")?
        .ok_or_else(|| AppError::validation("file", "file is required"))?;
    let caption = form.text("content").map(str::to_string);

    let message = state
        .deadline
        .run(
            state
                .services
                .chat
                .send_file(&principal, community_id, caption.as_deref(), upload),
        )
        .await?;
    Ok(created(message))
}

/// GET /communities/:id/chat?before=&after=&limit=&sender=
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(community_id): Path<i64>,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Response, AppError> {
    let window = MessageWindow {
        before: query.before,
        after: query.after,
        limit: query.limit,
        sender: query.sender,
    };
    let messages = state
        .deadline
        .run(
            state
                .services
                .chat
                .get_messages(&principal, community_id, &window),
        )
        .await?;
    Ok(ok(messages))
}

/// DELETE /communities/:id/chat/:message_id
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((community_id, message_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .deadline
        .run(
            state
                .services
                .chat
                .delete_message(&principal, community_id, message_id),
        )
        .await?;
    Ok(Json(ApiResponse::message("Message deleted")))
}
