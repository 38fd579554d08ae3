// HTTP API for the submission form

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{silent_clip, CallLog, FakeCapture};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use village_voice::{
    create_router, AppState, Blob, CaptureDevice, DirectoryUploader, NoCaptureDevice,
    ObjectUrlRegistry, SessionConfig, SessionServices, Uploader,
};

struct TestApp {
    router: Router,
    files: tempfile::TempDir,
}

fn app() -> TestApp {
    let files = tempfile::tempdir().unwrap();
    let uploader = Arc::new(DirectoryUploader::new(files.path(), "http://localhost/files"));
    app_with(Arc::new(NoCaptureDevice), uploader, files)
}

fn app_with(capture: Arc<dyn CaptureDevice>, uploader: Arc<dyn Uploader>, files: tempfile::TempDir) -> TestApp {
    let services = SessionServices {
        config: SessionConfig::default(),
        capture,
        references: Arc::new(ObjectUrlRegistry::new()),
    };
    let state = AppState::new(services, uploader, files.path());

    TestApp {
        router: create_router(state),
        files,
    }
}

/// Uploader whose storage is unreachable
struct OfflineUploader;

#[async_trait::async_trait]
impl Uploader for OfflineUploader {
    async fn upload(&self, blob: &Blob) -> anyhow::Result<String> {
        anyhow::bail!("storage offline while sending {}", blob.name())
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload(uri: &str, mime_type: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", mime_type)
        .body(Body::from(bytes))
        .unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn open_session(router: &Router) -> String {
    let (status, body) = send_json(router, post("/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["recorder"]["state"], "idle");
    body["session_id"].as_str().unwrap().to_string()
}

fn wav_bytes() -> Vec<u8> {
    silent_clip(1).encode().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = app();

    let (status, body) = send_json(&app.router, get("/sessions/session-missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("session-missing"));

    let (status, _) = send_json(&app.router, post("/sessions/session-missing/play")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_capture_without_device_is_unavailable() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, body) =
        send_json(&app.router, post(&format!("/sessions/{}/capture/start", id))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (_, body) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(body["state"], "idle");
}

#[tokio::test]
async fn test_supply_file_and_play() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, _) = send_json(
        &app.router,
        upload(&format!("/sessions/{}/file?name=photo.png", id), "image/png", vec![1, 2, 3]),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, body) = send_json(
        &app.router,
        upload(&format!("/sessions/{}/file?name=song.wav", id), "audio/wav", wav_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["recording"]["name"], "song.wav");
    assert_eq!(body["recording"]["size_mb"], "0.02");

    // The local reference serves the attached bytes
    let reference = body["local_reference"].as_str().unwrap().to_string();
    let (status, bytes) = send(&app.router, get(&format!("/blobs/{}", reference))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, wav_bytes());

    let (status, body) = send_json(&app.router, post(&format!("/sessions/{}/play", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "playing");

    let (status, _) = send_json(
        &app.router,
        upload(&format!("/sessions/{}/file?name=other.wav", id), "audio/wav", wav_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send_json(&app.router, post(&format!("/sessions/{}/discard", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert!(body["local_reference"].is_null());

    // Revoked with the discard
    let (status, _) = send(&app.router, get(&format!("/blobs/{}", reference))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_play_without_recording_is_a_no_op() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, body) = send_json(&app.router, post(&format!("/sessions/{}/play", id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
}

#[tokio::test]
async fn test_pause_when_not_playing_conflicts() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, _) = send_json(&app.router, post(&format!("/sessions/{}/pause", id))).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_add_image_rejects_audio() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, _) = send_json(
        &app.router,
        upload(&format!("/sessions/{}/images?name=a.wav", id), "audio/wav", wav_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, body) = send_json(
        &app.router,
        upload(&format!("/sessions/{}/images?name=a.png", id), "image/png", vec![9, 9]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"], 1);
}

#[tokio::test]
async fn test_submit_story() {
    let app = app();
    let id = open_session(&app.router).await;

    send_json(
        &app.router,
        upload(&format!("/sessions/{}/file?name=song.wav", id), "audio/wav", wav_bytes()),
    )
    .await;
    send_json(
        &app.router,
        with_json(
            "PUT",
            &format!("/sessions/{}/description", id),
            json!({"text": "Sung at the harvest"}),
        ),
    )
    .await;
    send_json(
        &app.router,
        upload(&format!("/sessions/{}/images?name=field.png", id), "image/png", vec![7; 8]),
    )
    .await;

    // Invalid drafts keep the recording attached
    let (status, body) = send_json(
        &app.router,
        with_json("POST", &format!("/sessions/{}/submit", id), json!({"title": "Harvest"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
    let (_, snapshot) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(snapshot["state"], "stopped");

    let draft = json!({
        "title": "Harvest song",
        "content": "We sing this while cutting the paddy.",
        "story_type": "song",
        "village_name": "Kondapalli",
        "state": "Andhra Pradesh",
        "author_name": "Sita",
        "author_age": "54",
        "tags": ["harvest"]
    });
    let (status, story) = send_json(
        &app.router,
        with_json("POST", &format!("/sessions/{}/submit", id), draft),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(story["title"], "Harvest song");
    assert_eq!(story["language"], "Telugu");
    assert_eq!(story["author_age"], 54);
    assert_eq!(story["voice_description"], "Sung at the harvest");
    assert_eq!(story["images"].as_array().unwrap().len(), 1);

    // The uploaded recording is published under /files
    let url = story["voice_recording_url"].as_str().unwrap();
    let file_name = url.strip_prefix("http://localhost/files/").unwrap();
    assert!(app.files.path().join(file_name).exists());
    let (status, bytes) = send(&app.router, get(&format!("/files/{}", file_name))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, wav_bytes());

    // The form is closed after a successful submission
    let (status, _) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_close_session() {
    let app = app();
    let id = open_session(&app.router).await;

    let (status, _) = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_failed_upload_leaves_the_form_as_it_was() {
    let files = tempfile::tempdir().unwrap();
    let capture = FakeCapture::new(CallLog::default());
    let app = app_with(Arc::new(capture), Arc::new(OfflineUploader), files);
    let id = open_session(&app.router).await;

    let (status, _) = send_json(&app.router, post(&format!("/sessions/{}/capture/start", id))).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    send_json(&app.router, post(&format!("/sessions/{}/capture/stop", id))).await;
    send_json(
        &app.router,
        with_json(
            "PUT",
            &format!("/sessions/{}/description", id),
            json!({"text": "Grandmother's lullaby"}),
        ),
    )
    .await;
    let (_, before) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(before["state"], "stopped");
    assert_eq!(before["elapsed"], "0:02");

    let draft = json!({
        "title": "Lullaby",
        "content": "Sung to every child in the house.",
        "story_type": "song",
        "village_name": "Kondapalli",
        "state": "Andhra Pradesh",
        "author_name": "Sita",
        "author_age": "54"
    });
    let (status, body) = send_json(
        &app.router,
        with_json("POST", &format!("/sessions/{}/submit", id), draft),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("storage offline"));

    let (status, after) = send_json(&app.router, get(&format!("/sessions/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after, before);

    // The same reference still serves the recording
    let reference = after["local_reference"].as_str().unwrap();
    let (status, _) = send(&app.router, get(&format!("/blobs/{}", reference))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_idle_forms_close_but_recording_forms_stay() {
    let files = tempfile::tempdir().unwrap();
    let services = SessionServices {
        config: SessionConfig::default(),
        capture: Arc::new(FakeCapture::new(CallLog::default())),
        references: Arc::new(ObjectUrlRegistry::new()),
    };
    let uploader = Arc::new(DirectoryUploader::new(files.path(), "http://localhost/files"));
    let state = AppState::new(services, uploader, files.path());
    let router = create_router(state.clone());

    let abandoned = open_session(&router).await;
    let recording = open_session(&router).await;
    let (status, _) = send_json(&router, post(&format!("/sessions/{}/capture/start", recording))).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_secs(31 * 60)).await;
    assert_eq!(state.reap_idle(Duration::from_secs(30 * 60)).await, 1);

    let (status, _) = send_json(&router, get(&format!("/sessions/{}", abandoned))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send_json(&router, get(&format!("/sessions/{}", recording))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "recording");
}
