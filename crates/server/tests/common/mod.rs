//! Common test utilities for API testing with a mock engine.
//!
//! This module provides a test fixture that creates an in-process router
//! with the mock engine injected and all storage under a temp directory,
//! so the full HTTP surface can be exercised without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidgenie_core::{testing::MockEngine, Config};
use vidgenie_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use vidgenie_core::testing::fixtures;

const BOUNDARY: &str = "vidgenie-test-boundary";

/// Test fixture for API testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new();
///
///     let response = fixture
///         .post_multipart("/api/convert", MultipartForm::new().file("clip.mp4", b"data").text("outputFormat", "mp4"))
///         .await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - script conversions, probes and thumbnails
    pub engine: Arc<MockEngine>,
    /// Application state behind the router
    pub state: Arc<AppState>,
    /// Temporary directory holding uploads, working files and output
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test fixture, adjusting the configuration first.
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.storage.upload_dir = temp_dir.path().join("uploads");
        config.storage.working_dir = temp_dir.path().join("uploads/working");
        config.storage.output_dir = temp_dir.path().join("output");
        config.jobs.poll_interval_ms = 10;
        configure(&mut config);

        let engine = Arc::new(MockEngine::new());
        let state = Arc::new(AppState::new(config, engine.clone()));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            engine,
            state,
            temp_dir,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.state.config().storage.upload_dir.clone()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.state.config().storage.output_dir.clone()
    }

    /// Files left in the upload directory (ignoring the working subdirectory).
    pub fn residual_uploads(&self) -> usize {
        std::fs::read_dir(self.upload_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_file())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Send a request and collect the whole response body.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
            .await
            .expect("Response body did not finish")
            .expect("Failed to read body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&self, path: &str, form: MultipartForm) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.build()))
            .unwrap();
        self.send(request).await
    }
}

/// Builder for `multipart/form-data` request bodies.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file part named `file`.
    pub fn file(self, filename: &str, content: &[u8]) -> Self {
        self.file_field("file", filename, "video/mp4", content)
    }

    pub fn file_field(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        content: &[u8],
    ) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}
