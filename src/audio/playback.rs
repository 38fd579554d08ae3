use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::duration::audio_duration;
use crate::media::{LocalRef, ObjectUrlRegistry};

/// Asynchronous signals raised by a playback device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Paused,
    /// Playback reached the end of the audio
    Ended,
}

/// Audio playback device
///
/// Playback always starts from the beginning of the source.
pub trait PlaybackDevice: Send {
    fn play(&mut self, source: &LocalRef);

    fn pause(&mut self);
}

/// Headless playback device that only keeps time
///
/// Emits `Started` on play and `Ended` once the source's playing time has
/// elapsed; `pause` cancels the clock and emits `Paused`. Sources whose
/// length cannot be determined play until paused.
pub struct TimedPlayback {
    references: Arc<ObjectUrlRegistry>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    clock: Option<JoinHandle<()>>,
}

impl TimedPlayback {
    pub fn new(references: Arc<ObjectUrlRegistry>, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            references,
            events,
            clock: None,
        }
    }

    fn source_duration(&self, source: &LocalRef) -> Option<Duration> {
        let blob = self.references.resolve(source)?;
        audio_duration(blob.bytes(), blob.mime_type())
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }
}

impl PlaybackDevice for TimedPlayback {
    fn play(&mut self, source: &LocalRef) {
        self.stop_clock();

        let Some(duration) = self.source_duration(source) else {
            warn!("Playing {}: unknown length, plays until paused", source);
            let _ = self.events.send(PlaybackEvent::Started);
            return;
        };

        info!("Playing {} ({:.1}s)", source, duration.as_secs_f64());
        let _ = self.events.send(PlaybackEvent::Started);

        let events = self.events.clone();
        self.clock = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!("Playback ended");
            let _ = events.send(PlaybackEvent::Ended);
        }));
    }

    fn pause(&mut self) {
        self.stop_clock();
        info!("Playback paused");
        let _ = self.events.send(PlaybackEvent::Paused);
    }
}

impl Drop for TimedPlayback {
    fn drop(&mut self) {
        self.stop_clock();
    }
}
