//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Microphone capture and the elapsed-time tick
//! - Attaching an uploaded audio file instead of a capture
//! - Playback of the attached recording through a local reference
//! - Release of device and reference resources on every exit path
//!
//! `SessionHandle` runs a session on its own task for async callers.

mod config;
mod driver;
mod session;
mod state;

pub use config::SessionConfig;
pub use driver::{SessionHandle, SessionServices};
pub use session::RecordingSession;
pub use state::{format_elapsed, RecordingState, SessionEvent, SessionSnapshot};
