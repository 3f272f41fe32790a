use std::collections::HashMap;
use std::str::FromStr;

use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};

use crate::error::AppError;
use crate::service::Upload;

/// A fully buffered multipart body: plain text fields plus file parts.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: Vec<(String, Upload)>,
}

fn bad_body(e: impl std::fmt::Display) -> AppError {
    AppError::Validation {
        field: None,
        message: format!("Malformed multipart body: {}", e),
    }
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(bad_body)?;
                    form.files
                        .push((name, Upload::new(file_name, content_type, data.to_vec())));
                }
                None => {
                    let value = field.text().await.map_err(bad_body)?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::validation(name, format!("{} is required", name)))
    }

    /// Parses an optional field; empty strings count as absent.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.text(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| AppError::validation(name, format!("{} is invalid", name))),
        }
    }

    pub fn parse_required<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.parse(name)?
            .ok_or_else(|| AppError::validation(name, format!("{} is required", name)))
    }

    /// Removes and returns every file part named `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }

    pub fn take_file(&mut self, name: &str) -> Result<Option<Upload>, AppError> {
        let mut files = self.take_files(name);
        match files.len() {
            0 => Ok(None),
            1 => Ok(files.pop()),
            _ => Err(AppError::validation(name, "Only one file is accepted")),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for Form
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Form::read(multipart).await
    }
}
