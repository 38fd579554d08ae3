use super::state::{AppState, FormSession};
use crate::error::{SessionError, StoryError};
use crate::media::{Blob, LocalRef};
use crate::session::SessionSnapshot;
use crate::story::{self, StoryDraft};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
    pub recorder: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    /// File name to record for the upload
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub session_id: String,
    pub images: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn session_not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

fn session_error_response(error: SessionError) -> Response {
    let status = match &error {
        SessionError::DeviceAccess { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::InvalidMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        SessionError::InvalidState { .. } | SessionError::NoPlaybackSource => StatusCode::CONFLICT,
        SessionError::CaptureFinalize { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SessionError::Closed => StatusCode::GONE,
    };
    error_response(status, error)
}

fn story_error_response(error: StoryError) -> Response {
    match error {
        StoryError::Upload { .. } => {
            error!("{}", error);
            error_response(StatusCode::BAD_GATEWAY, error)
        }
        _ => error_response(StatusCode::UNPROCESSABLE_ENTITY, error),
    }
}

fn snapshot_response(result: Result<SessionSnapshot, SessionError>) -> Response {
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => session_error_response(e),
    }
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Open a submission form with an idle recorder
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = format!("session-{}", uuid::Uuid::new_v4());
    let recorder = state.services.open(session_id.clone());

    let snapshot = match recorder.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return session_error_response(e),
    };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), FormSession::new(recorder));
    }

    info!("Opened session {}", session_id);

    (
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            session_id,
            recorder: snapshot,
        }),
    )
        .into_response()
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.snapshot().await),
        None => session_not_found(&session_id),
    }
}

/// DELETE /sessions/:session_id
/// Cancel the form; releases the microphone and any local reference
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let form = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match form {
        Some(form) => {
            if let Err(e) = form.recorder.close().await {
                warn!("Session {} already closed: {}", session_id, e);
            }
            info!("Closed session {}", session_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/capture/start
pub async fn start_capture(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.start_capture().await),
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/capture/stop
pub async fn stop_capture(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.stop_capture().await),
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/file?name=<name>
/// Attach an audio file sent as the raw request body
pub async fn supply_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(recorder) = state.recorder(&session_id).await else {
        return session_not_found(&session_id);
    };

    let name = query.name.unwrap_or_else(|| "voice-recording".to_string());
    let file = Blob::new(name, content_type(&headers), body.to_vec());

    snapshot_response(recorder.supply_file(file).await)
}

/// POST /sessions/:session_id/play
/// Playing with nothing attached is not an error; the snapshot is returned unchanged
pub async fn play(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(recorder) = state.recorder(&session_id).await else {
        return session_not_found(&session_id);
    };

    match recorder.play().await {
        Err(e) if e.is_benign() => {
            debug!("Session {}: {}", session_id, e);
            snapshot_response(recorder.snapshot().await)
        }
        result => snapshot_response(result),
    }
}

/// POST /sessions/:session_id/pause
pub async fn pause(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.pause().await),
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/discard
pub async fn discard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.discard().await),
        None => session_not_found(&session_id),
    }
}

/// PUT /sessions/:session_id/description
pub async fn set_description(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<DescriptionRequest>,
) -> impl IntoResponse {
    match state.recorder(&session_id).await {
        Some(recorder) => snapshot_response(recorder.set_description(req.text).await),
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/images?name=<name>
/// Add an image sent as the raw request body
pub async fn add_image(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let name = query.name.unwrap_or_else(|| "image".to_string());
    let image = Blob::new(name, content_type(&headers), body.to_vec());

    if !image.is_image() {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Unsupported media type {}: expected image/*", image.mime_type()),
        );
    }

    let mut sessions = state.sessions.write().await;
    match sessions.get_mut(&session_id) {
        Some(form) => {
            form.touch();
            form.images.push(image);
            (
                StatusCode::OK,
                Json(ImagesResponse {
                    session_id: session_id.clone(),
                    images: form.images.len(),
                }),
            )
                .into_response()
        }
        None => session_not_found(&session_id),
    }
}

/// POST /sessions/:session_id/submit
/// Upload the form's media and create the story
///
/// The recording stays attached until the story is stored, so a failed
/// upload leaves the form as it was and the user can retry.
pub async fn submit_story(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(mut draft): Json<StoryDraft>,
) -> impl IntoResponse {
    let (recorder, images) = {
        let mut sessions = state.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(form) => {
                form.touch();
                (form.recorder.clone(), form.images.clone())
            }
            None => return session_not_found(&session_id),
        }
    };

    if let Err(e) = draft.validate() {
        return story_error_response(e);
    }

    let recording = match recorder.recording().await {
        Ok(recording) => recording,
        Err(e) => return session_error_response(e),
    };

    if let Some((_, description)) = &recording {
        if !description.trim().is_empty() {
            draft.voice_description = description.clone();
        }
    }

    let voice = recording.as_ref().map(|(blob, _)| blob);
    match story::submit(draft, &images, voice, state.uploader.as_ref()).await {
        Ok(story) => {
            {
                let mut sessions = state.sessions.write().await;
                sessions.remove(&session_id);
            }
            if let Err(e) = recorder.close().await {
                warn!("Session {} already closed: {}", session_id, e);
            }
            info!("Session {} submitted story {}", session_id, story.id);
            (StatusCode::CREATED, Json(story)).into_response()
        }
        Err(e) => story_error_response(e),
    }
}

/// GET /blobs/:reference
/// Bytes behind a live local reference
pub async fn get_blob(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> impl IntoResponse {
    let reference = if reference.starts_with("blob:") {
        LocalRef::new(reference)
    } else {
        LocalRef::new(format!("blob:{}", reference))
    };

    match state.references.resolve(&reference) {
        Some(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, blob.mime_type().to_string())],
            blob.bytes().to_vec(),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Reference {} not found", reference),
        ),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
