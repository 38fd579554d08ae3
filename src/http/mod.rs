//! HTTP API for the story submission form
//!
//! This module exposes the recording session and story submission over REST:
//! - POST /sessions - Open a submission form with an idle recorder
//! - GET /sessions/:id - Recorder snapshot
//! - POST /sessions/:id/capture/{start,stop} - Microphone capture
//! - POST /sessions/:id/file - Attach an audio file (raw body)
//! - POST /sessions/:id/{play,pause,discard} - Playback and removal
//! - PUT /sessions/:id/description - Describe the recording
//! - POST /sessions/:id/images - Add an image (raw body)
//! - POST /sessions/:id/submit - Upload media and create the story
//! - GET /blobs/:reference - Bytes behind a live local reference
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, FormSession};
