use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type. Every pipeline stage fails with one of these,
/// and the handler converts it to a JSON response at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("No PDF file was uploaded")]
    FileMissing,

    #[error("PDF parse error: {0}")]
    Parse(String),

    #[error("PDF contains no extractable text")]
    EmptyText,

    #[error("Completion error: {0}")]
    Completion(#[from] LlmError),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Upload(_) | AppError::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::FileMissing | AppError::Parse(_) | AppError::EmptyText => {
                StatusCode::BAD_REQUEST
            }
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::FileMissing => "FILE_MISSING",
            AppError::Parse(_) => "PARSE_ERROR",
            AppError::EmptyText => "EMPTY_TEXT",
            AppError::Completion(_) => "COMPLETION_ERROR",
            AppError::Timeout { .. } => "TIMEOUT",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// Message shown to the caller. Library detail lives in `details()`.
    pub fn message(&self) -> String {
        match self {
            AppError::Upload(_) => "File upload failed".to_string(),
            AppError::FileMissing => "PDF file not found in the upload".to_string(),
            AppError::Parse(_) => "The uploaded file could not be read as a PDF".to_string(),
            AppError::EmptyText => "No text could be extracted from the PDF".to_string(),
            AppError::Completion(_) => "Failed to generate feedback".to_string(),
            AppError::Timeout { .. } => self.to_string(),
            AppError::MethodNotAllowed => "Method Not Allowed".to_string(),
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            AppError::Upload(detail) | AppError::Parse(detail) => Some(detail.clone()),
            AppError::Completion(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Builds the JSON error response. `details` is only attached when
    /// `expose_details` is set.
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{self}");
        } else {
            tracing::warn!(kind = self.kind(), "{self}");
        }

        let mut body = json!({
            "error": self.message(),
            "kind": self.kind(),
        });
        if expose_details {
            if let Some(details) = self.details() {
                body["details"] = json!(details);
            }
        }

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}
