//! Error types for village-voice.

use thiserror::Error;

use crate::session::RecordingState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Capture device unavailable or permission denied
    #[error("Capture device unavailable: {message}")]
    DeviceAccess { message: String },

    /// Supplied file is not an audio type
    #[error("Unsupported media type {mime_type}: expected audio/*")]
    InvalidMediaType { mime_type: String },

    /// Operation not allowed from the current state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecordingState,
    },

    /// Playback requested with no recording attached
    #[error("No recording to play")]
    NoPlaybackSource,

    /// Device stream could not be finalized into a recording
    #[error("Failed to finalize recording: {message}")]
    CaptureFinalize { message: String },

    /// The task driving the session has exited
    #[error("Recording session is closed")]
    Closed,
}

impl SessionError {
    pub fn device_access(message: impl Into<String>) -> Self {
        Self::DeviceAccess {
            message: message.into(),
        }
    }

    /// Whether callers may ignore this error without telling the user
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoPlaybackSource)
    }
}

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("Invalid author age: {0}")]
    InvalidAge(String),

    #[error("Upload failed for {name}: {message}")]
    Upload { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;
