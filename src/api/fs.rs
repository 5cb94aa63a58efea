//! File read endpoint.

use std::io::ErrorKind;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::Json;

use super::types::{ApiError, FileContent, PathQuery};

/// `GET /read?path=` - return the file's text content.
pub async fn read_file(Query(q): Query<PathQuery>) -> Result<Json<FileContent>, ApiError> {
    match tokio::fs::read_to_string(&q.path).await {
        Ok(content) => Ok(Json(FileContent { content })),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", q.path),
        )),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", q.path, e);
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error reading file: {}", e),
            ))
        }
    }
}
