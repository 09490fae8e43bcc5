//! File upload endpoint.

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::errors::{messages, AppError};
use crate::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Multipart field carrying the file.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /uploads - Store the `file` part and return its public URL.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let filename = format!(
            "{}-{}{}",
            Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension
        );
        tokio::fs::create_dir_all(&state.config.uploads_dir).await?;
        tokio::fs::write(state.config.uploads_dir.join(&filename), &data).await?;
        tracing::info!("Stored upload {} ({} bytes)", filename, data.len());

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("http://{}/uploads/{}", host, filename),
            }),
        ));
    }

    Err(AppError::BadRequest(messages::NO_FILE_UPLOADED.to_string()))
}
