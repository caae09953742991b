use base64::Engine;
use tracing::warn;

use super::backend::AudioFrame;

/// Slice configuration
#[derive(Debug, Clone)]
pub struct SliceConfig {
    /// Sample rate of the encoded slices
    pub sample_rate: u32,
    /// Channel count of the encoded slices (1 = mono)
    pub channels: u16,
    /// Target duration of one slice before it is encoded and sent
    pub slice_duration_ms: u64,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            slice_duration_ms: 1000,
        }
    }
}

/// Accumulates capture frames into fixed-duration slices and encodes each
/// slice as a base64 WAV payload ready for an `audio_chunk` message.
///
/// Incoming frames are converted to the configured rate and channel count
/// before buffering, so a slice is internally uniform no matter what the
/// device delivered.
pub struct SliceEncoder {
    config: SliceConfig,
    samples: Vec<i16>,
    samples_per_slice: usize,
}

impl SliceEncoder {
    pub fn new(config: SliceConfig) -> Self {
        let samples_per_slice = (config.sample_rate as u64 * config.channels as u64
            * config.slice_duration_ms
            / 1000) as usize;

        Self {
            config,
            samples: Vec::new(),
            samples_per_slice: samples_per_slice.max(1),
        }
    }

    /// Feed one frame; returns an encoded slice once enough audio has accumulated
    pub fn push(&mut self, frame: AudioFrame) -> Option<String> {
        let frame = downsample_frame(frame, self.config.sample_rate);
        let frame = if self.config.channels == 1 {
            stereo_to_mono(frame)
        } else {
            frame
        };

        self.samples.extend_from_slice(&frame.samples);

        if self.samples.len() >= self.samples_per_slice {
            return self.take_slice();
        }

        None
    }

    /// Encode whatever is buffered, if anything. Used on capture stop.
    pub fn flush(&mut self) -> Option<String> {
        if self.samples.is_empty() {
            return None;
        }
        self.take_slice()
    }

    pub fn buffered_samples(&self) -> usize {
        self.samples.len()
    }

    fn take_slice(&mut self) -> Option<String> {
        let samples = std::mem::take(&mut self.samples);

        match encode_wav(&samples, self.config.sample_rate, self.config.channels) {
            Ok(wav) => Some(base64::engine::general_purpose::STANDARD.encode(wav)),
            Err(e) => {
                warn!("Failed to encode audio slice, dropping it: {}", e);
                None
            }
        }
    }
}

/// Encode i16 PCM samples as an in-memory WAV file
fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> hound::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Downsample audio frame by decimation
fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 {
        return frame; // Can't upsample
    }

    // Decimate: take every Nth sample, aligned to whole sample positions so
    // interleaved channels stay paired
    let step = ratio as usize * frame.channels as usize;
    let mut downsampled = Vec::with_capacity(frame.samples.len() / ratio as usize + 1);
    let mut i = 0;
    while i + frame.channels as usize <= frame.samples.len() {
        downsampled.extend_from_slice(&frame.samples[i..i + frame.channels as usize]);
        i += step;
    }

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels == 1 {
        return frame;
    }

    if frame.channels != 2 {
        return frame; // Only support stereo -> mono
    }

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);

    for chunk in frame.samples.chunks_exact(2) {
        let left = chunk[0] as i32;
        let right = chunk[1] as i32;
        let sum = left + right;
        let mono = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        mono_samples.push(mono);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
