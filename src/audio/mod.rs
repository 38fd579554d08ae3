pub mod capture;
pub mod duration;
pub mod playback;
pub mod wav;

pub use capture::{CaptureDevice, CaptureGuard, CaptureStream, ChunkReceiver, NoCaptureDevice};
pub use duration::audio_duration;
pub use playback::{PlaybackDevice, PlaybackEvent, TimedPlayback};
pub use wav::{WavClip, WavFileCapture};
