use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the elapsed-time tick while recording
    /// Default: 1 second
    pub tick_interval: Duration,

    /// MIME type stamped on captured recordings
    pub recording_mime_type: String,

    /// File name prefix for captured recordings
    /// (e.g., "voice-recording" → "voice-recording-1730000000000.wav")
    pub recording_name_prefix: String,

    /// File extension for captured recordings
    pub recording_extension: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            recording_mime_type: "audio/wav".to_string(),
            recording_name_prefix: "voice-recording".to_string(),
            recording_extension: "wav".to_string(),
        }
    }
}
