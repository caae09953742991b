use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate after slice conversion
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Frame buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

/// Audio capture backend trait
///
/// The production implementation is the cpal microphone backend; tests
/// inject scripted backends that replay fixed frames.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. Fails if
    /// no input device is available or the device refuses to open.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device handle
    async fn stop(&mut self) -> Result<()>;

    /// Check if the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Microphone capture via cpal
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread for the
/// whole capture; frames cross into async land over an mpsc channel.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.running.load(Ordering::SeqCst) {
            return Err(anyhow!("Capture already running"));
        }

        // Hold roughly five seconds of frames before the callback starts dropping
        let capacity = (5000 / self.config.buffer_duration_ms.max(1)).max(8) as usize;
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        let worker = std::thread::spawn(move || capture_thread(frame_tx, ready_tx, running));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(anyhow!("Capture thread exited before opening the device"));
            }
        }

        self.worker = Some(worker);
        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(worker) = self.worker.take() {
            // Joining blocks until the stream is dropped and the device released
            let joined = tokio::task::spawn_blocking(move || worker.join()).await;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => error!("Capture thread panicked"),
                Err(e) => error!("Failed to join capture thread: {}", e),
            }
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Owns the cpal stream for the lifetime of one capture.
///
/// Device-open failures are reported back through `ready` so the caller can
/// surface a permission/availability error without starting a session.
fn capture_thread(
    frame_tx: mpsc::Sender<AudioFrame>,
    ready: oneshot::Sender<Result<()>>,
    running: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(anyhow!("No input device available")));
            return;
        }
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown input".to_string());

    let supported = match device
        .default_input_config()
        .context("Failed to query input device config")
    {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let sample_format = supported.sample_format();
    let stream_config = supported.config();
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    info!(
        "Input device: {} ({} Hz, {} ch, {:?})",
        device_name, sample_rate, channels, sample_format
    );

    let started = Instant::now();
    let err_fn = |err: cpal::StreamError| error!("Capture stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::I16 => {
            let tx = frame_tx.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    forward_frame(&tx, data.to_vec(), sample_rate, channels, &started);
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::F32 => {
            let tx = frame_tx.clone();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&x| (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    forward_frame(&tx, samples, sample_rate, channels, &started);
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(anyhow!("Unsupported sample format: {:?}", other)));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(
                anyhow::Error::new(e).context("Failed to open input stream")
            ));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(
            anyhow::Error::new(e).context("Failed to start input stream")
        ));
        return;
    }

    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Dropping the stream releases the device handle
    drop(stream);
}

fn forward_frame(
    tx: &mpsc::Sender<AudioFrame>,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    started: &Instant,
) {
    if samples.is_empty() {
        return;
    }

    let frame = AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp_ms: started.elapsed().as_millis() as u64,
    };

    // The device callback must never block: drop the frame if the session
    // side is not keeping up
    if tx.try_send(frame).is_err() {
        warn!("Capture consumer lagging, dropping frame");
    }
}
