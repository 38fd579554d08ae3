use hound::WavReader;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Playing time of an encoded audio file, if it can be determined
///
/// WAV is read with hound; anything else (MP3, OGG, FLAC, M4A, ...) and WAV
/// flavours hound does not handle are read with symphonia.
pub fn audio_duration(bytes: &[u8], mime_type: &str) -> Option<Duration> {
    wav_duration(bytes).or_else(|| decoded_duration(bytes, mime_type))
}

fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = WavReader::new(Cursor::new(bytes)).ok()?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(reader.duration() as f64 / sample_rate as f64))
}

fn decoded_duration(bytes: &[u8], mime_type: &str) -> Option<Duration> {
    let mut hint = Hint::new();
    hint.mime_type(mime_type);

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let opened = match symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(opened) => opened,
        Err(e) => {
            debug!("Cannot read {} audio: {}", mime_type, e);
            return None;
        }
    };

    let mut format = opened.format;
    let track = format.default_track()?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Some(Duration::from_secs_f64(frames as f64 / rate as f64));
        }
    }

    // No frame count in the header: add up packet durations instead
    let time_base = params.time_base?;
    let mut ticks = 0u64;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            ticks += packet.dur;
        }
    }
    if ticks == 0 {
        return None;
    }

    let time = time_base.calc_time(ticks);
    Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
}
