use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::state::{format_elapsed, RecordingState, SessionEvent, SessionSnapshot};
use crate::audio::{CaptureDevice, CaptureGuard, PlaybackDevice, PlaybackEvent};
use crate::error::{Result, SessionError};
use crate::media::{Blob, BlobInfo, LocalRef, LocalReferences, PlaybackRef};

/// Capture/playback lifecycle of the voice recording attached to one story
///
/// Every operation takes `&mut self` and runs to completion before the next
/// one starts. The capture stream and the local reference are held in guards,
/// so dropping the session releases the microphone and revokes the reference.
pub struct RecordingSession {
    /// Session configuration
    config: SessionConfig,

    capture_device: Arc<dyn CaptureDevice>,
    playback: Box<dyn PlaybackDevice>,
    references: Arc<dyn LocalReferences>,

    state: RecordingState,

    /// Whole seconds captured so far, advanced only by ticks while recording
    elapsed_seconds: u64,

    /// Open device stream and the chunks received from it
    capture: Option<CaptureGuard>,

    /// Attached recording; present iff the state is `Stopped` or `Playing`
    audio_blob: Option<Blob>,

    /// Local reference to `audio_blob` used for playback
    playback_ref: Option<PlaybackRef>,

    description: String,

    /// Last millisecond stamp used in a recording name
    last_stamp_ms: i64,
}

impl RecordingSession {
    pub fn new(
        config: SessionConfig,
        capture_device: Arc<dyn CaptureDevice>,
        playback: Box<dyn PlaybackDevice>,
        references: Arc<dyn LocalReferences>,
    ) -> Self {
        Self {
            config,
            capture_device,
            playback,
            references,
            state: RecordingState::Idle,
            elapsed_seconds: 0,
            capture: None,
            audio_blob: None,
            playback_ref: None,
            description: String::new(),
            last_stamp_ms: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recording_info(&self) -> Option<BlobInfo> {
        self.audio_blob.as_ref().map(Blob::info)
    }

    pub fn local_reference(&self) -> Option<&LocalRef> {
        self.playback_ref.as_ref().map(PlaybackRef::reference)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            elapsed: format_elapsed(self.elapsed_seconds),
            recording: self.recording_info(),
            local_reference: self.local_reference().cloned(),
            description: self.description.clone(),
        }
    }

    /// Acquire the capture device and start recording
    pub async fn start_capture(&mut self) -> Result<()> {
        self.require(&[RecordingState::Idle], "start capture")?;

        let (stream, chunks) = self.capture_device.begin().await.map_err(|e| {
            warn!("Capture device {} unavailable: {}", self.capture_device.name(), e);
            e
        })?;

        self.capture = Some(CaptureGuard::new(stream, chunks));
        self.elapsed_seconds = 0;
        self.state = RecordingState::Recording;

        info!("Recording started on {}", self.capture_device.name());
        Ok(())
    }

    /// Finalize the capture into the attached recording
    ///
    /// The device tracks are released whether or not finalizing succeeds. A
    /// failed finalize leaves nothing to attach, so the session returns to
    /// `Idle`.
    pub async fn stop_capture(&mut self) -> Result<()> {
        self.require(&[RecordingState::Recording], "stop capture")?;

        let Some(mut capture) = self.capture.take() else {
            self.reset();
            return Err(SessionError::CaptureFinalize {
                message: "no open capture stream".to_string(),
            });
        };

        let finalized = capture.finalize().await;
        capture.release();

        match finalized {
            Ok(bytes) => {
                let name = self.next_recording_name();
                let blob = Blob::new(name, self.config.recording_mime_type.clone(), bytes);
                info!(
                    "Recording stopped after {}: {} ({} bytes)",
                    format_elapsed(self.elapsed_seconds),
                    blob.name(),
                    blob.size()
                );
                self.attach(blob);
                Ok(())
            }
            Err(e) => {
                warn!("Recording discarded: {}", e);
                self.reset();
                Err(e)
            }
        }
    }

    /// Attach an externally chosen audio file, replacing any current recording
    pub fn supply_file(&mut self, file: Blob) -> Result<()> {
        self.require(&[RecordingState::Idle, RecordingState::Stopped], "supply a file")?;

        if !file.is_audio() {
            warn!("Rejected {} ({}): not audio", file.name(), file.mime_type());
            return Err(SessionError::InvalidMediaType {
                mime_type: file.mime_type().to_string(),
            });
        }

        info!("Attached {} ({} bytes)", file.name(), file.size());
        self.attach(file);
        Ok(())
    }

    /// Play the attached recording from the beginning
    pub fn play(&mut self) -> Result<()> {
        if self.state == RecordingState::Idle {
            debug!("Play requested with no recording attached");
            return Err(SessionError::NoPlaybackSource);
        }
        self.require(&[RecordingState::Stopped], "play")?;

        let Some(playback_ref) = &self.playback_ref else {
            debug!("Play requested with no local reference");
            return Err(SessionError::NoPlaybackSource);
        };

        self.playback.play(playback_ref.reference());
        self.state = RecordingState::Playing;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.require(&[RecordingState::Playing], "pause")?;

        self.playback.pause();
        self.state = RecordingState::Stopped;
        Ok(())
    }

    /// Drop everything and return to `Idle`. Safe in any state.
    pub fn discard(&mut self) {
        if self.state == RecordingState::Idle && self.capture.is_none() && self.audio_blob.is_none() {
            return;
        }

        if self.state == RecordingState::Playing {
            self.playback.pause();
        }

        info!("Recording discarded ({})", self.state);
        self.reset();
    }

    /// Set the recording's description; ignored when nothing is attached
    pub fn set_description(&mut self, text: impl Into<String>) {
        if self.audio_blob.is_none() {
            debug!("Ignoring description without a recording");
            return;
        }
        self.description = text.into();
    }

    /// Deliver a device or timer event
    pub fn handle_event(&mut self, event: SessionEvent) {
        match (event, self.state) {
            (SessionEvent::Tick, RecordingState::Recording) => {
                self.elapsed_seconds += 1;
                if let Some(capture) = self.capture.as_mut() {
                    capture.drain();
                    debug!(
                        "Recording {}: {} chunks",
                        format_elapsed(self.elapsed_seconds),
                        capture.chunk_count()
                    );
                }
            }
            (SessionEvent::Playback(PlaybackEvent::Started), RecordingState::Stopped)
                if self.playback_ref.is_some() =>
            {
                self.state = RecordingState::Playing;
            }
            (
                SessionEvent::Playback(PlaybackEvent::Paused | PlaybackEvent::Ended),
                RecordingState::Playing,
            ) => {
                self.state = RecordingState::Stopped;
            }
            (event, state) => {
                debug!("Ignoring {:?} while {}", event, state);
            }
        }
    }

    /// The attached recording and its description, left in place
    pub fn recording(&self) -> Option<(Blob, String)> {
        self.audio_blob
            .clone()
            .map(|blob| (blob, self.description.clone()))
    }

    /// Hand the attached recording and its description to the submitting
    /// form, then discard the session
    pub fn take_for_submission(&mut self) -> Option<(Blob, String)> {
        let taken = self.recording();
        self.discard();
        taken
    }

    fn require(&self, allowed: &[RecordingState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            warn!("Cannot {} while {}", operation, self.state);
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Install a recording, revoking the previous reference before creating
    /// the new one
    fn attach(&mut self, blob: Blob) {
        if let Some(previous) = self.playback_ref.take() {
            previous.release();
        }
        self.playback_ref = Some(PlaybackRef::acquire(Arc::clone(&self.references), &blob));
        self.audio_blob = Some(blob);
        self.state = RecordingState::Stopped;
    }

    fn reset(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.release();
        }
        if let Some(playback_ref) = self.playback_ref.take() {
            playback_ref.release();
        }
        self.audio_blob = None;
        self.elapsed_seconds = 0;
        self.description.clear();
        self.state = RecordingState::Idle;
    }

    /// Recording names carry a millisecond stamp that never repeats within
    /// one session
    fn next_recording_name(&mut self) -> String {
        let stamp = Utc::now().timestamp_millis().max(self.last_stamp_ms + 1);
        self.last_stamp_ms = stamp;
        format!(
            "{}-{}.{}",
            self.config.recording_name_prefix, stamp, self.config.recording_extension
        )
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.discard();
    }
}
