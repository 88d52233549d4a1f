//! Multipart Ingestor — stages the uploaded résumé in a temp file.

use std::path::Path;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::AppError;

/// Form field that carries the PDF.
pub const FILE_FIELD: &str = "file";

/// A staged upload. The temp file is removed by `cleanup`, or on drop.
#[derive(Debug)]
pub struct UploadedFile {
    path: TempPath,
    pub size: u64,
    pub declared_mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the staged bytes back.
    pub async fn read(&self) -> Result<Vec<u8>, AppError> {
        tokio::fs::read(self.path()).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileMissing
            } else {
                AppError::Upload(format!("failed to read staged upload: {e}"))
            }
        })
    }

    /// Deletes the temp file on the blocking pool.
    pub async fn cleanup(self) {
        let path = self.path;
        match tokio::task::spawn_blocking(move || path.close()).await {
            Ok(Ok(())) => debug!("Removed staged upload"),
            Ok(Err(e)) => warn!("Failed to remove staged upload: {e}"),
            Err(e) => warn!("Upload cleanup task failed: {e}"),
        }
    }
}

/// Pulls the `file` field out of the form and writes it under `upload_dir`.
///
/// Only the first `file` value carrying a filename is used. Everything after
/// it in the body is left unread.
pub async fn ingest_upload(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if field.file_name().is_none() {
            debug!("Skipping '{FILE_FIELD}' form value without a filename");
            continue;
        }

        let uploaded = persist_field(field, upload_dir).await?;
        return confirm_staged(uploaded).await;
    }

    Err(AppError::FileMissing)
}

/// The upload dir is shared; confirms the staged file is still on disk.
async fn confirm_staged(uploaded: UploadedFile) -> Result<UploadedFile, AppError> {
    if tokio::fs::try_exists(uploaded.path()).await.unwrap_or(false) {
        Ok(uploaded)
    } else {
        Err(AppError::FileMissing)
    }
}

async fn persist_field(mut field: Field<'_>, upload_dir: &Path) -> Result<UploadedFile, AppError> {
    let declared_mime_type = field.content_type().map(str::to_string);
    let file_name = field.file_name().map(str::to_string);

    let staged = tempfile::Builder::new()
        .prefix("resume-")
        .suffix(".pdf")
        .tempfile_in(upload_dir)
        .map_err(|e| AppError::Upload(format!("failed to create temp file: {e}")))?;
    let (file, path) = staged.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
        size += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Upload(format!("failed to write temp file: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Upload(format!("failed to write temp file: {e}")))?;

    debug!(
        size,
        mime = declared_mime_type.as_deref().unwrap_or("unknown"),
        "Staged upload"
    );

    Ok(UploadedFile {
        path,
        size,
        declared_mime_type,
        file_name,
    })
}

fn upload_error(e: MultipartError) -> AppError {
    AppError::Upload(e.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    const BOUNDARY: &str = "feedback-test-boundary";

    fn part(name: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut out = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"");
        if let Some(file_name) = file_name {
            out.push_str(&format!(
                "; filename=\"{file_name}\"\r\nContent-Type: application/pdf"
            ));
        }
        out.push_str("\r\n\r\n");
        let mut out = out.into_bytes();
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
        out
    }

    async fn multipart(parts: Vec<Vec<u8>>) -> Multipart {
        let mut body: Vec<u8> = parts.concat();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_stages_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![
            part("note", None, b"hello"),
            part("file", Some("cv.pdf"), b"%PDF-1.4 body"),
        ])
        .await;

        let uploaded = ingest_upload(&mut form, dir.path()).await.unwrap();
        assert_eq!(uploaded.size, 13);
        assert_eq!(uploaded.file_name.as_deref(), Some("cv.pdf"));
        assert_eq!(
            uploaded.declared_mime_type.as_deref(),
            Some("application/pdf")
        );
        assert!(uploaded.path().starts_with(dir.path()));
        assert_eq!(uploaded.read().await.unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_first_of_repeated_file_fields_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![
            part("file", Some("first.pdf"), b"first"),
            part("file", Some("second.pdf"), b"second"),
        ])
        .await;

        let uploaded = ingest_upload(&mut form, dir.path()).await.unwrap();
        assert_eq!(uploaded.file_name.as_deref(), Some("first.pdf"));
        assert_eq!(uploaded.read().await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![part("resume", Some("cv.pdf"), b"data")]).await;

        let err = ingest_upload(&mut form, dir.path()).await.unwrap_err();
        assert!(matches!(err, AppError::FileMissing));
    }

    #[tokio::test]
    async fn test_plain_value_named_file_is_not_an_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![part("file", None, b"just text")]).await;

        let err = ingest_upload(&mut form, dir.path()).await.unwrap_err();
        assert!(matches!(err, AppError::FileMissing));
    }

    #[tokio::test]
    async fn test_cleanup_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![part("file", Some("cv.pdf"), b"data")]).await;

        let uploaded = ingest_upload(&mut form, dir.path()).await.unwrap();
        let staged = uploaded.path().to_path_buf();
        assert!(staged.exists());

        uploaded.cleanup().await;
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_staged_file_removed_before_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![part("file", Some("cv.pdf"), b"data")]).await;

        let uploaded = ingest_upload(&mut form, dir.path()).await.unwrap();
        std::fs::remove_file(uploaded.path()).unwrap();

        let err = confirm_staged(uploaded).await.unwrap_err();
        assert!(matches!(err, AppError::FileMissing));
    }

    #[tokio::test]
    async fn test_read_after_removal_is_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = multipart(vec![part("file", Some("cv.pdf"), b"data")]).await;

        let uploaded = ingest_upload(&mut form, dir.path()).await.unwrap();
        std::fs::remove_file(uploaded.path()).unwrap();

        let err = uploaded.read().await.unwrap_err();
        assert!(matches!(err, AppError::FileMissing));
    }

    #[tokio::test]
    async fn test_unreachable_upload_dir_is_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut form = multipart(vec![part("file", Some("cv.pdf"), b"data")]).await;

        let err = ingest_upload(&mut form, &missing).await.unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
    }
}
