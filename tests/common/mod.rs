// Fake collaborators shared by the integration tests
//
// Every fake writes to one shared call log so tests can assert both how
// often and in which order the session touched its devices.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use village_voice::audio::ChunkReceiver;
use village_voice::{
    Blob, CaptureDevice, CaptureStream, LocalRef, LocalReferences, PlaybackDevice,
    RecordingSession, SessionConfig, SessionError, WavClip,
};

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of entries starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Index of the first entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Capture device with scripted chunks and failures
#[derive(Clone, Default)]
pub struct FakeCapture {
    pub log: CallLog,
    pub deny: bool,
    pub fail_finalize: bool,
    pub chunks_on_begin: Vec<Vec<u8>>,
    pub chunks_on_finalize: Vec<Vec<u8>>,
    /// Sender of the most recent stream, for pushing chunks mid-capture
    pub live: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl FakeCapture {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            chunks_on_begin: vec![b"RIFF".to_vec()],
            ..Default::default()
        }
    }

    pub fn push_chunk(&self, chunk: &[u8]) {
        if let Some(tx) = self.live.lock().unwrap().as_ref() {
            tx.send(chunk.to_vec()).unwrap();
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FakeCapture {
    async fn begin(&self) -> Result<(Box<dyn CaptureStream>, ChunkReceiver), SessionError> {
        self.log.push("begin");
        if self.deny {
            return Err(SessionError::device_access("permission denied"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.chunks_on_begin {
            tx.send(chunk.clone()).unwrap();
        }
        *self.live.lock().unwrap() = Some(tx.clone());

        let stream = FakeStream {
            log: self.log.clone(),
            tx: Some(tx),
            final_chunks: self.chunks_on_finalize.clone(),
            fail_finalize: self.fail_finalize,
        };
        Ok((Box::new(stream), rx))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeStream {
    log: CallLog,
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    final_chunks: Vec<Vec<u8>>,
    fail_finalize: bool,
}

#[async_trait::async_trait]
impl CaptureStream for FakeStream {
    async fn finalize(&mut self) -> Result<(), SessionError> {
        self.log.push("finalize");
        if self.fail_finalize {
            return Err(SessionError::CaptureFinalize {
                message: "encoder failed".to_string(),
            });
        }
        if let Some(tx) = self.tx.take() {
            for chunk in &self.final_chunks {
                tx.send(chunk.clone()).unwrap();
            }
        }
        Ok(())
    }

    fn release_tracks(&mut self) {
        self.log.push("release");
        self.tx = None;
    }
}

pub struct FakePlayback {
    pub log: CallLog,
}

impl PlaybackDevice for FakePlayback {
    fn play(&mut self, source: &LocalRef) {
        self.log.push(format!("play:{}", source));
    }

    fn pause(&mut self) {
        self.log.push("pause");
    }
}

#[derive(Default)]
pub struct FakeReferences {
    pub log: CallLog,
    next: AtomicUsize,
}

impl FakeReferences {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            next: AtomicUsize::new(0),
        }
    }
}

impl LocalReferences for FakeReferences {
    fn create(&self, _blob: &Blob) -> LocalRef {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let reference = LocalRef::new(format!("blob:fake-{}", n));
        self.log.push(format!("create:{}", reference));
        reference
    }

    fn revoke(&self, reference: &LocalRef) {
        self.log.push(format!("revoke:{}", reference));
    }
}

pub fn session_with(capture: FakeCapture) -> RecordingSession {
    let log = capture.log.clone();
    RecordingSession::new(
        SessionConfig::default(),
        Arc::new(capture),
        Box::new(FakePlayback { log: log.clone() }),
        Arc::new(FakeReferences::new(log)),
    )
}

pub fn audio_file(name: &str) -> Blob {
    Blob::new(name, "audio/wav", vec![1u8, 2, 3, 4])
}

pub fn image_file(name: &str) -> Blob {
    Blob::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

/// A silent mono 8kHz WAV clip of the given length
pub fn silent_clip(seconds: u32) -> WavClip {
    WavClip {
        sample_rate: 8000,
        channels: 1,
        samples: vec![0; 8000 * seconds as usize],
    }
}
