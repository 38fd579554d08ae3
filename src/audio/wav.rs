use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::capture::{CaptureDevice, CaptureStream, ChunkReceiver};
use crate::error::{Result, SessionError};

/// Decoded 16-bit PCM clip
#[derive(Debug, Clone)]
pub struct WavClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl WavClip {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        Self::from_reader(reader)
    }

    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        Self::from_reader(WavReader::new(Cursor::new(bytes))?)
    }

    fn from_reader<R: std::io::Read>(reader: WavReader<R>) -> anyhow::Result<Self> {
        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits) if bits <= 16 => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (SampleFormat::Int, bits) => {
                let shift = bits - 16;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| (s >> shift) as i16))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            (SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }

    /// Encode as a 16-bit PCM WAV file
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * 2
    }
}

/// Capture device that replays a WAV file as a live microphone
///
/// The clip is re-encoded as 16-bit PCM WAV and emitted in fixed-size
/// chunks paced at the clip's byte rate; the first chunk carries the header.
/// Stopping keeps only what was emitted so far: `finalize` drops the rest of
/// the clip and `seal` rewrites the header lengths to match, so the recording
/// is a valid WAV file as long as the capture ran.
pub struct WavFileCapture {
    path: PathBuf,
    chunk_bytes: usize,
    name: String,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>, chunk_bytes: usize) -> Self {
        let path = path.into();
        let name = format!("wav:{}", path.display());
        Self {
            path,
            chunk_bytes: chunk_bytes.max(64),
            name,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for WavFileCapture {
    async fn begin(&self) -> Result<(Box<dyn CaptureStream>, ChunkReceiver)> {
        let path = self.path.clone();
        let clip = tokio::task::spawn_blocking(move || WavClip::open(&path))
            .await
            .map_err(|e| SessionError::device_access(format!("capture task failed: {}", e)))?
            .map_err(|e| {
                SessionError::device_access(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        let encoded = clip
            .encode()
            .map_err(|e| SessionError::device_access(format!("cannot encode clip: {}", e)))?;

        info!(
            "Capture started from {}: {:.1}s, {}Hz, {} channels",
            self.path.display(),
            clip.duration().as_secs_f64(),
            clip.sample_rate,
            clip.channels
        );

        let header_len = data_offset(&encoded)
            .ok_or_else(|| SessionError::device_access("encoded clip has no data chunk"))?;
        let header = encoded[..header_len].to_vec();
        let block_align = usize::from(clip.channels.max(1)) * 2;

        let pending: VecDeque<Vec<u8>> = encoded.chunks(self.chunk_bytes).map(<[u8]>::to_vec).collect();
        let pace = Duration::from_secs_f64(self.chunk_bytes as f64 / clip.bytes_per_second().max(1) as f64);

        let (tx, rx) = mpsc::unbounded_channel();
        let stream = WavFileStream::start(pending, tx, pace, header, block_align);
        Ok((Box::new(stream), rx))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct WavFileStream {
    pending: Arc<Mutex<VecDeque<Vec<u8>>>>,
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    pacer: Option<JoinHandle<()>>,
    /// Everything before the first sample byte
    header: Vec<u8>,
    /// Bytes per sample frame
    block_align: usize,
}

impl WavFileStream {
    fn start(
        pending: VecDeque<Vec<u8>>,
        sender: mpsc::UnboundedSender<Vec<u8>>,
        pace: Duration,
        header: Vec<u8>,
        block_align: usize,
    ) -> Self {
        let pending = Arc::new(Mutex::new(pending));

        let pacer = {
            let pending = Arc::clone(&pending);
            let sender = sender.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(pace).await;
                    // Pop and send under the lock so finalize never sees a chunk in flight
                    let mut queue = lock(&pending);
                    match queue.pop_front() {
                        Some(chunk) => {
                            if sender.send(chunk).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            })
        };

        Self {
            pending,
            sender: Some(sender),
            pacer: Some(pacer),
            header,
            block_align,
        }
    }

    fn stop_pacer(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.abort();
        }
    }
}

#[async_trait::async_trait]
impl CaptureStream for WavFileStream {
    async fn finalize(&mut self) -> Result<()> {
        self.stop_pacer();

        if self.sender.take().is_none() {
            return Err(SessionError::CaptureFinalize {
                message: "stream already finalized".to_string(),
            });
        }

        // Audio not paced out yet was never captured
        let mut queue = lock(&self.pending);
        if !queue.is_empty() {
            debug!("Dropping {} chunks past the stop", queue.len());
            queue.clear();
        }
        Ok(())
    }

    fn seal(&mut self, recording: Vec<u8>) -> Result<Vec<u8>> {
        let header_len = self.header.len();
        let mut bytes = if recording.len() < header_len {
            self.header.clone()
        } else {
            recording
        };

        let data_len = (bytes.len() - header_len) / self.block_align * self.block_align;
        bytes.truncate(header_len + data_len);

        let too_large = |_| SessionError::CaptureFinalize {
            message: "recording exceeds the WAV size limit".to_string(),
        };
        let riff_len = u32::try_from(bytes.len() - 8).map_err(too_large)?;
        let data_len = u32::try_from(data_len).map_err(too_large)?;
        bytes[4..8].copy_from_slice(&riff_len.to_le_bytes());
        bytes[header_len - 4..header_len].copy_from_slice(&data_len.to_le_bytes());
        Ok(bytes)
    }

    fn release_tracks(&mut self) {
        self.stop_pacer();
        self.sender = None;
        lock(&self.pending).clear();
    }
}

impl Drop for WavFileStream {
    fn drop(&mut self) {
        if self.pacer.is_some() {
            warn!("WAV capture stream dropped without release");
            self.stop_pacer();
        }
    }
}

/// Offset of the first sample byte in a RIFF/WAVE file
fn data_offset(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
        if &bytes[pos..pos + 4] == b"data" {
            return Some(pos + 8);
        }
        pos += 8 + size + size % 2;
    }
    None
}

fn lock(pending: &Mutex<VecDeque<Vec<u8>>>) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
