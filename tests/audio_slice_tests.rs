use base64::Engine;
use medai_client::audio::{AudioFrame, SliceConfig, SliceEncoder};

fn frame(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp_ms: 0,
    }
}

#[test]
fn test_slice_emitted_once_duration_reached() {
    let mut encoder = SliceEncoder::new(SliceConfig {
        sample_rate: 100,
        channels: 1,
        slice_duration_ms: 1000,
    });

    // 100 samples make one second at this rate
    assert!(encoder.push(frame(vec![1; 60], 100, 1)).is_none());
    assert_eq!(encoder.buffered_samples(), 60);

    let slice = encoder.push(frame(vec![2; 60], 100, 1));
    assert!(slice.is_some());
    assert_eq!(encoder.buffered_samples(), 0);
}

#[test]
fn test_flush_encodes_partial_slice() {
    let mut encoder = SliceEncoder::new(SliceConfig {
        sample_rate: 100,
        channels: 1,
        slice_duration_ms: 1000,
    });

    assert!(encoder.push(frame(vec![3; 10], 100, 1)).is_none());
    assert!(encoder.flush().is_some());

    // Nothing left after a flush
    assert!(encoder.flush().is_none());
}

#[test]
fn test_slice_payload_is_valid_wav() {
    let mut encoder = SliceEncoder::new(SliceConfig {
        sample_rate: 100,
        channels: 1,
        slice_duration_ms: 100,
    });

    let samples = vec![100, -200, 300, -400, 500, -600, 700, -800, 900, -1000];
    let payload = encoder.push(frame(samples.clone(), 100, 1));

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.expect("slice should be emitted"))
        .expect("payload should be base64");

    let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).expect("valid wav");
    assert_eq!(reader.spec().sample_rate, 100);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded, samples);
}

#[test]
fn test_stereo_input_is_downmixed() {
    let mut encoder = SliceEncoder::new(SliceConfig {
        sample_rate: 100,
        channels: 1,
        slice_duration_ms: 1000,
    });

    // 4 interleaved stereo samples become 2 mono samples
    assert!(encoder.push(frame(vec![10, 30, -10, -30], 100, 2)).is_none());
    assert_eq!(encoder.buffered_samples(), 2);
}

#[test]
fn test_high_rate_input_is_decimated() {
    let mut encoder = SliceEncoder::new(SliceConfig {
        sample_rate: 16000,
        channels: 1,
        slice_duration_ms: 1000,
    });

    // 48 kHz mono decimates 3:1
    assert!(encoder.push(frame(vec![0; 4800], 48000, 1)).is_none());
    assert_eq!(encoder.buffered_samples(), 1600);
}
