use super::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_empty_url_list_is_rejected_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (app, service, _temp_dir) = create_test_app().await;

    let response = app
        .oneshot(post_json("/api/download-zip", &json!({ "urls": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("no URLs"));

    let mut entries = tokio::fs::read_dir(service.store().dir()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_urls_field_is_rejected() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let response = app
        .oneshot(post_json("/api/download-zip", &json!({ "username": "alice" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_url_is_rejected() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/download-zip",
            &json!({ "urls": ["https://example.com/", "   "] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("#2"));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (app, _service, _temp_dir) = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/download-zip")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_successful_batch_returns_zip_url_and_logs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .mount(&server)
        .await;

    let (app, _service, _temp_dir) = create_test_app().await;
    let urls = vec![
        format!("{}/", server.uri()),
        format!("{}/img.png", server.uri()),
    ];

    let response = app
        .oneshot(post_json("/api/download-zip", &json!({ "urls": urls })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let zip_url = body["zipUrl"].as_str().unwrap();
    assert!(zip_url.starts_with("/api/download-zip/downloaded_"), "{zip_url}");
    assert!(zip_url.ends_with(".zip"), "{zip_url}");
    assert!(body["message"].is_string());

    let logs = body["downloadLogs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["url"], urls[0]);
    assert_eq!(logs[0]["status"], "success");
    assert_eq!(logs[0]["retries"], 0);
    assert!(logs[0].get("error").is_none());
    assert_eq!(logs[1]["url"], urls[1]);
}

#[tokio::test]
async fn test_failed_url_returns_502_with_logs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&server)
        .await;

    let (app, service, _temp_dir) = create_test_app().await;
    let urls = vec![
        format!("{}/missing.txt", server.uri()),
        format!("{}/ok.txt", server.uri()),
    ];

    let response = app
        .oneshot(post_json("/api/download-zip", &json!({ "urls": urls })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "batch_failed");
    assert_eq!(body["error"], "1 of 2 URLs failed to download");
    assert_eq!(body["failedUrls"], json!([urls[0]]));

    let logs = body["downloadLogs"].as_array().unwrap();
    assert_eq!(logs[0]["status"], "failed");
    assert_eq!(logs[0]["retries"], 3);
    assert_eq!(logs[0]["error"], "status: 404 Not Found");
    assert_eq!(logs[1]["status"], "success");
    assert!(body.get("zipUrl").is_none());

    let mut entries = tokio::fs::read_dir(service.store().dir()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none(), "no archive may be stored");
}

#[tokio::test]
async fn test_credentials_are_forwarded_as_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.txt"))
        .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret stuff"))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _service, _temp_dir) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/download-zip",
            &json!({
                "urls": [format!("{}/private.txt", server.uri())],
                "username": "alice",
                "password": "secret",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_submission_after_shutdown_is_503() {
    let (app, service, _temp_dir) = create_test_app().await;
    service.shutdown().await.unwrap();

    let response = app
        .oneshot(post_json(
            "/api/download-zip",
            &json!({ "urls": ["https://example.com/"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
