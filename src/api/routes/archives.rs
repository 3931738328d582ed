//! Archive download handler.

use crate::api::AppState;
use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// GET /api/download-zip/:filename - Download an archive and delete it
#[utoipa::path(
    get,
    path = "/api/download-zip/{filename}",
    tag = "batches",
    params(
        ("filename" = String, Path, description = "Archive name returned in zipUrl")
    ),
    responses(
        (status = 200, description = "Archive bytes", content_type = "application/zip"),
        (status = 400, description = "Invalid archive name", body = crate::error::ApiError),
        (status = 404, description = "Archive not found or already downloaded", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn download_archive(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.service.retrieve(&filename).await {
        Ok(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.id);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.content,
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
