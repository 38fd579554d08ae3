pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod session;
pub mod story;

pub use audio::{
    CaptureDevice, CaptureStream, NoCaptureDevice, PlaybackDevice, PlaybackEvent, TimedPlayback,
    WavClip, WavFileCapture,
};
pub use config::Config;
pub use error::{SessionError, StoryError};
pub use http::{create_router, AppState};
pub use media::{Blob, DirectoryUploader, LocalRef, LocalReferences, ObjectUrlRegistry, Uploader};
pub use session::{
    RecordingSession, RecordingState, SessionConfig, SessionEvent, SessionHandle, SessionServices,
    SessionSnapshot,
};
pub use story::{Story, StoryDraft, StoryType};
