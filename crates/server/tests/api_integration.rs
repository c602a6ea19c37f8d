//! API integration tests against the in-process router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{fixtures, MultipartForm, TestFixture};
use vidgenie_core::{testing::MockStep, EngineEvent};

const FIXTURE_VIDEO: &[u8] = b"not really a video, the mock engine does not care";

// =============================================================================
// Health / config
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_config_reports_effective_settings() {
    let fixture = TestFixture::with_config(|c| c.thumbnails.width = 480);
    let response = fixture.get("/api/config").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["server"]["port"], 4000);
    assert_eq!(body["thumbnails"]["width"], 480);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let fixture = TestFixture::new();
    let request = Request::builder()
        .uri("/api/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = fixture.send(request).await;

    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("vidgenie_http_requests_total"));
}

// =============================================================================
// Conversion
// =============================================================================

#[tokio::test]
async fn test_convert_without_file_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_multipart("/api/convert", MultipartForm::new().text("outputFormat", "mp4"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No file uploaded"}));
    assert!(fixture.state.registry().is_empty());
    assert!(fixture.engine.recorded_transcodes().await.is_empty());
}

#[tokio::test]
async fn test_convert_without_multipart_body_is_rejected() {
    let fixture = TestFixture::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = fixture.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "No file uploaded");
}

#[tokio::test]
async fn test_convert_without_format_is_rejected() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_multipart("/api/convert", MultipartForm::new().file("clip.mp4", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No output format specified"}));
    assert!(fixture.state.registry().is_empty());
    assert_eq!(fixture.residual_uploads(), 0);
}

#[tokio::test]
async fn test_convert_rejects_formats_outside_allow_list() {
    let fixture = TestFixture::with_config(|c| c.jobs.allowed_formats = vec!["mp4".to_string()]);
    let response = fixture
        .post_multipart(
            "/api/convert",
            MultipartForm::new()
                .file("clip.mp4", FIXTURE_VIDEO)
                .text("outputFormat", "webm"),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Unsupported output format");
    assert_eq!(response.json()["details"], "webm");
    assert!(fixture.engine.recorded_transcodes().await.is_empty());
    assert_eq!(fixture.residual_uploads(), 0);
}

#[tokio::test]
async fn test_convert_returns_converted_file() {
    let fixture = TestFixture::new();
    fixture.engine.set_output_bytes(b"converted bytes".to_vec()).await;

    let response = fixture
        .post_multipart(
            "/api/convert",
            MultipartForm::new()
                .file("holiday.mov", FIXTURE_VIDEO)
                .text("outputFormat", "mp4"),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"converted bytes");
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"holiday_converted.mp4\"")
    );

    let job_id = response
        .header("x-conversion-id")
        .expect("missing X-Conversion-Id")
        .to_string();
    assert!(Uuid::parse_str(&job_id).is_ok());

    // Published copy is served from the job's directory in the output store
    assert!(fixture
        .output_dir()
        .join(&job_id)
        .join("holiday_converted.mp4")
        .exists());
    let published = fixture
        .get(&format!("/output/{}/holiday_converted.mp4", job_id))
        .await;
    assert_eq!(published.status, StatusCode::OK);
    assert_eq!(&published.body[..], b"converted bytes");

    // Input is cleaned up on success too
    assert_eq!(fixture.residual_uploads(), 0);

    // The finished job can still be observed once, then it is gone
    let progress = fixture
        .get(&format!("/api/convert/progress/{}", job_id))
        .await;
    assert_eq!(progress.text(), "data: 100\n\n");
    assert!(fixture.state.registry().is_empty());
}

#[tokio::test]
async fn test_same_upload_name_publishes_separately() {
    let fixture = TestFixture::new();
    let mut published = Vec::new();

    for content in [&b"first"[..], &b"second"[..]] {
        fixture.engine.set_output_bytes(content.to_vec()).await;
        let response = fixture
            .post_multipart(
                "/api/convert",
                MultipartForm::new()
                    .file("same.mov", FIXTURE_VIDEO)
                    .text("outputFormat", "mp4"),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        let job_id = response.header("x-conversion-id").unwrap().to_string();
        published.push(format!("/output/{}/same_converted.mp4", job_id));
    }

    assert_ne!(published[0], published[1]);
    assert_eq!(&fixture.get(&published[0]).await.body[..], b"first");
    assert_eq!(&fixture.get(&published[1]).await.body[..], b"second");
}

#[tokio::test]
async fn test_convert_engine_failure() {
    let fixture = TestFixture::new();
    fixture
        .engine
        .set_script(vec![
            MockStep::Emit(EngineEvent::Started),
            MockStep::Emit(EngineEvent::Progress { percent: 35.0 }),
            MockStep::Emit(EngineEvent::Failed {
                message: "ffmpeg exited with code 1: moov atom not found".to_string(),
            }),
        ])
        .await;

    let response = fixture
        .post_multipart(
            "/api/convert",
            MultipartForm::new()
                .file("broken.mp4", FIXTURE_VIDEO)
                .text("outputFormat", "webm"),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json(),
        json!({
            "error": "Conversion failed",
            "details": "ffmpeg exited with code 1: moov atom not found"
        })
    );
    assert_eq!(fixture.residual_uploads(), 0);

    // The failure is left for the progress stream, which closes on it
    let ids = fixture.state.registry().ids();
    assert_eq!(ids.len(), 1);
    let progress = fixture
        .get(&format!("/api/convert/progress/{}", ids[0]))
        .await;
    assert_eq!(progress.text(), "data: -1\n\n");
    assert!(fixture.state.registry().is_empty());
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let fixture = TestFixture::with_config(|c| c.storage.max_upload_bytes = 16);
    let response = fixture
        .post_multipart(
            "/api/convert",
            MultipartForm::new()
                .file("big.mp4", &[0u8; 64])
                .text("outputFormat", "mp4"),
        )
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json(), json!({"error": "File too large"}));
    assert_eq!(fixture.residual_uploads(), 0);
    assert!(fixture.state.registry().is_empty());
}

// =============================================================================
// Progress stream
// =============================================================================

#[tokio::test]
async fn test_progress_for_unknown_job_emits_zero_and_closes() {
    let fixture = TestFixture::new();
    let response = fixture
        .get(&format!("/api/convert/progress/{}", Uuid::new_v4()))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("text/event-stream"));
    assert_eq!(response.text(), "data: 0\n\n");
    assert_eq!(fixture.state.publisher().active_streams(), 0);
}

#[tokio::test]
async fn test_progress_for_malformed_id_emits_zero() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/convert/progress/not-a-job").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "data: 0\n\n");
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_metadata_reports_video_stream() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_multipart("/api/metadata", MultipartForm::new().file("clip.mp4", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let expected = fixtures::media_info();
    let body = response.json();
    assert_eq!(body["width"], expected.width.unwrap());
    assert_eq!(body["height"], expected.height.unwrap());
    assert_eq!(body["codec"], "h264");
    assert_eq!(body["duration"], 12.5);
    assert_eq!(body["format_name"], "mov,mp4,m4a,3gp,3g2,mj2");
    assert_eq!(fixture.residual_uploads(), 0);
}

#[tokio::test]
async fn test_metadata_audio_only_has_null_video_fields() {
    let fixture = TestFixture::new();
    fixture
        .engine
        .set_probe_result(fixtures::audio_media_info())
        .await;

    let response = fixture
        .post_multipart("/api/metadata", MultipartForm::new().file("song.mp3", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert!(body["width"].is_null());
    assert!(body["height"].is_null());
    assert!(body["codec"].is_null());
    assert_eq!(body["bit_rate"], 128_000);
}

#[tokio::test]
async fn test_metadata_failure() {
    let fixture = TestFixture::new();
    fixture.engine.set_probe_error("Invalid data found").await;

    let response = fixture
        .post_multipart("/api/metadata", MultipartForm::new().file("clip.mp4", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to extract metadata");
    assert!(response.json()["details"]
        .as_str()
        .unwrap()
        .contains("Invalid data found"));
    assert_eq!(fixture.residual_uploads(), 0);
}

#[tokio::test]
async fn test_metadata_without_file() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_multipart("/api/metadata", MultipartForm::new().text("other", "x"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json(), json!({"error": "No file uploaded"}));
}

// =============================================================================
// Thumbnails
// =============================================================================

#[tokio::test]
async fn test_thumbnails_returns_three_names() {
    let fixture = TestFixture::new();
    let response = fixture
        .post_multipart("/api/thumbnail", MultipartForm::new().file("clip.mp4", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"thumbnails": ["clip_thumb_1.png", "clip_thumb_2.png", "clip_thumb_3.png"]})
    );

    let requests = fixture.engine.recorded_thumbnails().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].count, 3);
    assert_eq!(requests[0].width, 320);

    let served = fixture.get("/output/clip_thumb_2.png").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(fixture.residual_uploads(), 0);
}

#[tokio::test]
async fn test_thumbnail_failure() {
    let fixture = TestFixture::new();
    fixture.engine.set_thumbnail_error("no video stream").await;

    let response = fixture
        .post_multipart("/api/thumbnail", MultipartForm::new().file("song.mp3", FIXTURE_VIDEO))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to generate thumbnails");
    assert_eq!(fixture.residual_uploads(), 0);
}
