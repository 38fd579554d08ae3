//! Recording states, events and the read-only snapshot handed to the form.

use serde::Serialize;
use std::fmt;

use crate::audio::PlaybackEvent;
use crate::media::{BlobInfo, LocalRef};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording attached
    #[default]
    Idle,
    /// Capturing from the device
    Recording,
    /// Recording attached, not playing
    Stopped,
    /// Recording attached and playing
    Playing,
}

impl RecordingState {
    /// Whether a recording is attached in this state
    pub fn has_recording(self) -> bool {
        matches!(self, Self::Stopped | Self::Playing)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Discrete inputs from the device layer, processed one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Periodic elapsed-time tick
    Tick,
    Playback(PlaybackEvent),
}

/// What the enclosing form may read about a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: RecordingState,
    pub elapsed_seconds: u64,
    /// Elapsed time as `m:ss`
    pub elapsed: String,
    pub recording: Option<BlobInfo>,
    pub local_reference: Option<LocalRef>,
    pub description: String,
}

/// Format seconds as `m:ss`
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
