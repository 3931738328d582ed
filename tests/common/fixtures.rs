//! Mock upstream sites and test service construction

use batch_zip::config::{RetryConfig, StorageConfig};
use batch_zip::{BatchZipService, Config};
use std::io::{Cursor, Read};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Body served for the site root
pub const HOME_HTML: &str = "<html><body>home</body></html>";

/// Body served for `/img.png`
pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake image";

/// Config with fast retries and a private temp directory
pub fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        retry: RetryConfig {
            initial_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        },
        storage: StorageConfig {
            temp_dir: temp_dir.path().join("artifacts"),
            ..StorageConfig::default()
        },
        ..Config::default()
    }
}

/// Service over a fresh temp directory
pub async fn create_test_service() -> Result<(BatchZipService, TempDir), String> {
    let temp_dir = tempfile::tempdir().map_err(|e| format!("Failed to create temp dir: {}", e))?;
    let service = BatchZipService::new(test_config(&temp_dir))
        .await
        .map_err(|e| format!("Failed to create service: {}", e))?;
    Ok((service, temp_dir))
}

/// Mock site with `/`, `/img.png`, `/docs/guide` and a permanently missing `/gone.txt`
pub async fn start_example_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOME_HTML))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES.to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_string("guide"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

/// Read every entry of a ZIP archive as (name, bytes), in archive order
pub fn read_zip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid ZIP archive");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("readable entry");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("entry content");
            (file.name().to_string(), content)
        })
        .collect()
}
