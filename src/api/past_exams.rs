use axum::{extract::State, response::Response, Extension};
use serde::Deserialize;

use crate::api::extract::{Path, Query};
use crate::api::multipart::Form;
use crate::api::response::{created, no_content, ok};
use crate::api::state::AppState;
use crate::db::models::Term;
use crate::db::past_exams::{PastExamChanges, PastExamFilter};
use crate::db::Page;
use crate::error::AppError;
use crate::policy::Principal;
use crate::service::past_exams::PastExamInput;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPastExamsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub department_id: Option<i64>,
    pub course_code: Option<String>,
    pub year: Option<i32>,
    pub term: Option<Term>,
}

/// POST /past-exams (multipart: fields + optional `file`)
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut form: Form,
) -> Result<Response, AppError> {
    let upload = form.take_file("file")?;
    let input = PastExamInput {
        year: form.parse_required("year")?,
        term: form.parse_required("term")?,
        department_id: form.parse_required("departmentId")?,
        course_code: form.required("courseCode")?.to_string(),
        title: form.required("title")?.to_string(),
        content: form.text("content").unwrap_or_default().to_string(),
    };

    let exam = state
        .deadline
        .run(state.services.past_exams.create(&principal, input, upload))
        .await?;
    Ok(created(exam))
}

/// GET /past-exams
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListPastExamsQuery>,
) -> Result<Response, AppError> {
    let filter = PastExamFilter {
        department_id: query.department_id,
        course_code: query.course_code,
        year: query.year,
        term: query.term,
    };
    let page = Page::new(query.page, query.page_size);
    let exams = state
        .deadline
        .run(state.services.past_exams.list(&principal, filter, page))
        .await?;
    Ok(ok(exams))
}

/// GET /past-exams/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let exam = state
        .deadline
        .run(state.services.past_exams.get(&principal, id))
        .await?;
    Ok(ok(exam))
}

/// PUT /past-exams/:id (multipart: any subset of fields + optional replacement `file`)
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
    mut form: Form,
) -> Result<Response, AppError> {
    let upload = form.take_file("file")?;
    let changes = PastExamChanges {
        year: form.parse("year")?,
        term: form.parse("term")?,
        department_id: form.parse("departmentId")?,
        course_code: form.text("courseCode").map(str::to_string),
        title: form.text("title").map(str::to_string),
        content: form.text("content").map(str::to_string),
    };

    let exam = state
        .deadline
        .run(state.services.past_exams.update(&principal, id, changes, upload))
        .await?;
    Ok(ok(exam))
}

/// DELETE /past-exams/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .deadline
        .run(state.services.past_exams.delete(&principal, id))
        .await?;
    Ok(no_content())
}
