//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the batch-zip REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the batch-zip REST API
///
/// The document is served at:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "batch-zip REST API",
        version = "0.1.0",
        description = "Fetch a batch of URLs concurrently, bundle them into a ZIP archive and download it once",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Batches
        crate::api::routes::submit_batch,
        crate::api::routes::download_archive,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::DownloadRequest,
        crate::types::FetchOutcome,
        crate::types::FetchStatus,

        crate::api::routes::BatchResponse,
        crate::api::routes::BatchFailureResponse,

        crate::error::ApiError,
    )),
    tags(
        (name = "batches", description = "Batch downloads - Submit URLs and retrieve the resulting archive"),
        (name = "system", description = "System endpoints - Health check and OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_both_batch_routes() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/api/download-zip"));
        assert!(spec.paths.paths.contains_key("/api/download-zip/{filename}"));
        assert!(spec.paths.paths.contains_key("/api/health"));
    }

    #[test]
    fn spec_has_request_and_response_schemas() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components should be present");

        for schema in [
            "DownloadRequest",
            "FetchOutcome",
            "FetchStatus",
            "BatchResponse",
            "BatchFailureResponse",
            "ApiError",
        ] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("batch-zip REST API"));
    }
}
