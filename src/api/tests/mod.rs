use super::*;
use crate::config::{RetryConfig, StorageConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;

mod batch;

/// Helper to create a test service (fast retries, private temp dir) wrapped in Arc
async fn create_test_service() -> (Arc<BatchZipService>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        retry: RetryConfig {
            initial_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        },
        storage: StorageConfig {
            temp_dir: temp_dir.path().join("artifacts"),
            ..StorageConfig::default()
        },
        ..Config::default()
    };
    let service = BatchZipService::new(config).await.unwrap();
    (Arc::new(service), temp_dir)
}

/// Router over a fresh test service
async fn create_test_app() -> (Router, Arc<BatchZipService>, tempfile::TempDir) {
    let (service, temp_dir) = create_test_service().await;
    let config = service.config().clone();
    (create_router(service.clone(), config), service, temp_dir)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops_on_shutdown() {
    let (service, _temp_dir) = create_test_service().await;

    // Port 0 = OS assigns a free port
    let mut config = (**service.config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let service = service.clone();
        let config = config.clone();
        async move { start_api_server(service, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    service.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), api_handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (service, _temp_dir) = create_test_service().await;

    let mut config = (**service.config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (service, _temp_dir) = create_test_service().await;

    let mut config = (**service.config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (service, _temp_dir) = create_test_service().await;

    let mut config = (**service.config()).clone();
    config.server.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://allowed.example"
    );
}

#[tokio::test]
async fn test_swagger_ui_can_be_disabled() {
    let (service, _temp_dir) = create_test_service().await;

    let mut config = (**service.config()).clone();
    config.server.api.swagger_ui = false;
    let app = create_router(service, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_router_serves_swagger_and_openapi_side_by_side() {
    let (service, _temp_dir) = create_test_service().await;
    assert!(service.config().server.api.swagger_ui);

    let app = create_router(service.clone(), service.config().clone());

    let response = app.clone().oneshot(get("/api/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get(SWAGGER_DOC_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/download-zip"]["post"].is_object());

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
