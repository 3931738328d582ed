//! Batch submission handler.

use super::{BatchFailureResponse, BatchResponse, archive_url};
use crate::api::AppState;
use crate::error::{ApiError, Error, ToHttpStatus};
use crate::types::{BatchOutcome, DownloadRequest};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /api/download-zip - Fetch a batch of URLs and build an archive
///
/// Every URL is fetched concurrently with up to three retries. The archive is
/// only built when all of them succeed.
#[utoipa::path(
    post,
    path = "/api/download-zip",
    tag = "batches",
    request_body = crate::types::DownloadRequest,
    responses(
        (status = 200, description = "Archive created", body = BatchResponse),
        (status = 400, description = "Malformed request or empty URL list", body = crate::error::ApiError),
        (status = 500, description = "Archive could not be built", body = crate::error::ApiError),
        (status = 502, description = "At least one URL failed to download", body = BatchFailureResponse),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_batch(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected batch request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::validation(rejection.body_text())),
            )
                .into_response();
        }
    };

    match state.service.submit(request).await {
        Ok(BatchOutcome::Archived { artifact, log }) => (
            StatusCode::OK,
            Json(BatchResponse {
                message: "ZIP archive created successfully".to_string(),
                zip_url: archive_url(artifact.id.as_str()),
                download_logs: log.into_outcomes(),
            }),
        )
            .into_response(),
        Ok(BatchOutcome::Failed { log }) => {
            let error = Error::BatchFailed {
                failed: log.failed_count(),
                total: log.len(),
            };
            let status =
                StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                Json(BatchFailureResponse {
                    error: error.to_string(),
                    code: error.error_code().to_string(),
                    failed_urls: log.failed_urls(),
                    download_logs: log.into_outcomes(),
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
