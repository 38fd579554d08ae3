use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Result, SessionError};

/// Encoded audio chunks, delivered in arrival order
pub type ChunkReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Audio capture device (microphone or a stand-in)
///
/// Implementations:
/// - `WavFileCapture`: replays a WAV file as if it were a microphone
/// - `NoCaptureDevice`: a host without any input device
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Fails with `SessionError::DeviceAccess` when permission is denied or
    /// no device exists. On success returns the open stream and the channel
    /// its chunks arrive on.
    async fn begin(&self) -> Result<(Box<dyn CaptureStream>, ChunkReceiver)>;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// An open capture stream holding the hardware tracks
#[async_trait::async_trait]
pub trait CaptureStream: Send {
    /// Flush buffered data onto the chunk channel and close it
    async fn finalize(&mut self) -> Result<()>;

    /// Turn the concatenated chunks into the finished recording
    ///
    /// Containers whose header records a length rewrite it here.
    fn seal(&mut self, recording: Vec<u8>) -> Result<Vec<u8>> {
        Ok(recording)
    }

    /// Release all device tracks. Called exactly once when capture ends.
    fn release_tracks(&mut self);
}

/// Scoped ownership of an open capture stream and the chunks it produced
///
/// The tracks are released on `release`, or on drop if the guard is
/// abandoned (discard, failed finalize, cancelled future).
pub struct CaptureGuard {
    stream: Box<dyn CaptureStream>,
    chunks: ChunkReceiver,
    collected: Vec<Vec<u8>>,
    released: bool,
}

impl CaptureGuard {
    pub fn new(stream: Box<dyn CaptureStream>, chunks: ChunkReceiver) -> Self {
        Self {
            stream,
            chunks,
            collected: Vec::new(),
            released: false,
        }
    }

    /// Move every chunk that has arrived so far into the collected list
    pub fn drain(&mut self) {
        while let Ok(chunk) = self.chunks.try_recv() {
            if !chunk.is_empty() {
                self.collected.push(chunk);
            }
        }
    }

    /// Number of non-empty chunks collected so far
    pub fn chunk_count(&self) -> usize {
        self.collected.len()
    }

    /// Finalize the stream and concatenate all chunks in arrival order
    pub async fn finalize(&mut self) -> Result<Vec<u8>> {
        self.drain();
        self.stream.finalize().await?;
        self.drain();

        let total: usize = self.collected.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in self.collected.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        let bytes = self.stream.seal(bytes)?;

        debug!("Finalized capture: {} bytes", bytes.len());
        Ok(bytes)
    }

    pub fn release(mut self) {
        self.release_tracks();
    }

    fn release_tracks(&mut self) {
        if !self.released {
            self.released = true;
            self.stream.release_tracks();
            info!("Capture tracks released");
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release_tracks();
    }
}

/// Capture device for hosts with no audio input
pub struct NoCaptureDevice;

#[async_trait::async_trait]
impl CaptureDevice for NoCaptureDevice {
    async fn begin(&self) -> Result<(Box<dyn CaptureStream>, ChunkReceiver)> {
        Err(SessionError::device_access("no capture device available"))
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStream {
        releases: Arc<AtomicUsize>,
        fail_finalize: bool,
    }

    #[async_trait::async_trait]
    impl CaptureStream for CountingStream {
        async fn finalize(&mut self) -> Result<()> {
            if self.fail_finalize {
                return Err(SessionError::CaptureFinalize {
                    message: "encoder crashed".to_string(),
                });
            }
            Ok(())
        }

        fn release_tracks(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn guard(fail_finalize: bool) -> (CaptureGuard, mpsc::UnboundedSender<Vec<u8>>, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = CountingStream {
            releases: releases.clone(),
            fail_finalize,
        };
        (CaptureGuard::new(Box::new(stream), rx), tx, releases)
    }

    #[tokio::test]
    async fn test_finalize_concatenates_in_arrival_order() {
        let (mut capture, tx, releases) = guard(false);
        tx.send(vec![1, 2]).unwrap();
        capture.drain();
        tx.send(Vec::new()).unwrap();
        tx.send(vec![3]).unwrap();
        tx.send(vec![4, 5]).unwrap();

        let bytes = capture.finalize().await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5]);

        capture.release();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_finalize_still_releases_on_drop() {
        let (mut capture, tx, releases) = guard(true);
        tx.send(vec![1]).unwrap();

        assert!(capture.finalize().await.is_err());
        drop(capture);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_silent_capture_finalizes_empty() {
        let (mut capture, _tx, _releases) = guard(false);
        assert!(capture.finalize().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_capture_device_denies_access() {
        let result = NoCaptureDevice.begin().await;
        assert!(matches!(result, Err(SessionError::DeviceAccess { .. })));
    }
}
