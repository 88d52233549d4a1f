//! Axum route handlers for the Feedback API.
//!
//! One request runs `ingest → read → extract → build prompt → complete` and
//! stops at the first failure. Every stage error is an `AppError`, converted
//! to JSON here and nowhere else.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::feedback::extract::extract_text;
use crate::feedback::prompts::build_feedback_request;
use crate::feedback::upload::ingest_upload;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub result: String,
}

/// POST /api/feedback
///
/// Accepts `multipart/form-data` with a PDF under `file` and returns the
/// model's feedback as `{"result": ...}`.
pub async fn handle_feedback(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let span = info_span!("feedback", request_id = %Uuid::new_v4());
    let expose_details = state.config.expose_error_details;

    match run_pipeline(&state, multipart).instrument(span).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response_with(expose_details),
    }
}

/// OPTIONS /api/feedback
///
/// CORS preflight. The router-wide header layers add the CORS headers.
pub async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /api/feedback.
pub async fn handle_method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn run_pipeline(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FeedbackResponse, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::Upload(e.body_text()))?;

    // Step 1: Stage the upload
    let upload = ingest_upload(&mut multipart, &state.config.upload_dir).await?;
    info!(
        size = upload.size,
        file_name = upload.file_name.as_deref().unwrap_or(""),
        mime = upload.declared_mime_type.as_deref().unwrap_or("unknown"),
        "Upload received"
    );

    // Step 2: Read it back; the temp file is not needed past this point
    let bytes = upload.read().await;
    upload.cleanup().await;
    let bytes = Bytes::from(bytes?);

    // Step 3: Extract text
    let text = extract_text(
        state.pdf_parser.as_ref(),
        bytes,
        state.config.extract_timeout,
    )
    .await?;
    if text.is_blank() {
        return Err(AppError::EmptyText);
    }

    // Step 4: Ask the model
    let request = build_feedback_request(&text);
    info!(chars = request.user().chars().count(), "Text extracted");
    let timeout = state.config.completion_timeout;
    let result = tokio::time::timeout(timeout, state.completion.complete(&request))
        .await
        .map_err(|_| AppError::Timeout {
            stage: "Completion",
            after: timeout,
        })??;
    info!(chars = result.chars().count(), "Feedback generated");

    Ok(FeedbackResponse { result })
}
