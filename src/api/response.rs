use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::models::{now_millis, to_rfc3339};

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Envelope shared by every response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            timestamp: to_rfc3339(now_millis()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
            timestamp: to_rfc3339(now_millis()),
        }
    }

    pub fn failure(error: ErrorDetail) -> Self {
        ApiResponse {
            success: false,
            message: None,
            data: None,
            error: Some(error),
            timestamp: to_rfc3339(now_millis()),
        }
    }
}

/// `200 OK` with the envelope.
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse::ok(data)).into_response()
}

/// `201 Created` with the envelope.
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

/// `204 No Content`.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::failure(ErrorDetail {
            code: "VAL_001",
            message: "Message content is required".into(),
            field: Some("content".into()),
            severity: "low",
            details: None,
        }))
        .unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VAL_001");
        assert_eq!(body["error"]["field"], "content");
        assert!(body.get("data").is_none());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2]).with_message("done")).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "done");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert!(body.get("error").is_none());
    }
}
