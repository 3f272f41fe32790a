use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use crate::api::extract::{Json, Path, Query};
use crate::api::multipart::Form;
use crate::api::response::{created, no_content, ok};
use crate::api::state::AppState;
use crate::db::class_notes::{ClassNoteChanges, ClassNoteFilter};
use crate::db::Page;
use crate::error::AppError;
use crate::policy::Principal;
use crate::service::class_notes::ClassNoteInput;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClassNotesQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub department_id: Option<i64>,
    pub course_code: Option<String>,
    pub uploader_user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassNoteRequest {
    pub course_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFilesRequest {
    pub file_ids: Vec<i64>,
}

/// POST /class-notes (multipart: fields + zero or more `files`)
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut form: Form,
) -> Result<Response, AppError> {
    let uploads = form.take_files("files");
    let input = ClassNoteInput {
        course_code: form.required("courseCode")?.to_string(),
        title: form.required("title")?.to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        content: form.text("content").unwrap_or_default().to_string(),
        department_id: form.parse_required("departmentId")?,
    };

    let note = state
        .deadline
        .run(state.services.class_notes.create(&principal, input, uploads))
        .await?;
    Ok(created(note))
}

/// GET /class-notes
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListClassNotesQuery>,
) -> Result<Response, AppError> {
    let filter = ClassNoteFilter {
        department_id: query.department_id,
        course_code: query.course_code,
        uploader_user_id: query.uploader_user_id,
    };
    let page = Page::new(query.page, query.page_size);
    let notes = state
        .deadline
        .run(state.services.class_notes.list(&principal, filter, page))
        .await?;
    Ok(ok(notes))
}

/// GET /class-notes/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let note = state
        .deadline
        .run(state.services.class_notes.get(&principal, id))
        .await?;
    Ok(ok(note))
}

/// PUT /class-notes/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateClassNoteRequest>,
) -> Result<Response, AppError> {
    let changes = ClassNoteChanges {
        course_code: req.course_code,
        title: req.title,
        description: req.description,
        content: req.content,
        department_id: req.department_id,
    };
    let note = state
        .deadline
        .run(state.services.class_notes.update(&principal, id, changes))
        .await?;
    Ok(ok(note))
}

/// DELETE /class-notes/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .deadline
        .run(state.services.class_notes.delete(&principal, id))
        .await?;
    Ok(no_content())
}

/// POST /class-notes/:id/files (multipart: one or more `files`)
pub async fn add_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    mut form: Form,
) -> Result<Response, AppError> {
    let uploads = form.take_files("files");
    let note = state
        .deadline
        .run(state.services.class_notes.add_files(&principal, id, uploads))
        .await?;
    Ok(ok(note))
}

/// DELETE /class-notes/:id/files
pub async fn remove_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    Json(req): Json<RemoveFilesRequest>,
) -> Result<Response, AppError> {
    let note = state
        .deadline
        .run(
            state
                .services
                .class_notes
                .remove_files(&principal, id, &req.file_ids),
        )
        .await?;
    Ok(ok(note))
}
