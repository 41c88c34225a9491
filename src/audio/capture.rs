//! Microphone capture
//!
//! `CaptureBackend` is the seam to the actual microphone device; an
//! implementation pushes fixed-size PCM frames (16 kHz, mono, 16-bit)
//! into a channel until stopped. `CaptureLoop` drains that channel and
//! forwards frames to the realtime connection, discarding any frame
//! captured while the model is speaking (half-duplex gate, checked per
//! frame). A WAV-file backend is included for development and tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::session::{SessionFault, TurnState};

use super::codec;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Microphone capture backend trait
///
/// Implementations own the device and deliver frames over a channel.
/// A closed channel before `stop` means the device failed.
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Where the capture loop sends forwarded frames.
///
/// Implemented by the realtime connection handle; tests substitute a
/// recording sink.
#[async_trait::async_trait]
pub trait CaptureSink: Send + Sync {
    async fn send_audio_chunk(&self, pcm: &[u8]) -> Result<()>;
}

/// Forwards captured frames to the connection, gated by turn-taking.
pub struct CaptureLoop {
    frames: mpsc::Receiver<AudioFrame>,
    turn: TurnState,
    sink: Arc<dyn CaptureSink>,
    running: Arc<AtomicBool>,
    faults: mpsc::Sender<SessionFault>,
    frames_sent: Arc<AtomicUsize>,
}

impl CaptureLoop {
    pub fn new(
        frames: mpsc::Receiver<AudioFrame>,
        turn: TurnState,
        sink: Arc<dyn CaptureSink>,
        running: Arc<AtomicBool>,
        faults: mpsc::Sender<SessionFault>,
        frames_sent: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frames,
            turn,
            sink,
            running,
            faults,
            frames_sent,
        }
    }

    /// Run until stopped or the frame stream ends.
    pub async fn run(mut self) {
        info!("Capture loop started");

        loop {
            let Some(frame) = self.frames.recv().await else {
                // Stream ended. If nobody asked us to stop, the device
                // is gone and the session needs to know.
                if self.running.load(Ordering::SeqCst) {
                    warn!("Capture stream ended unexpectedly");
                    let _ = self
                        .faults
                        .send(SessionFault::Capture(
                            "capture stream ended unexpectedly".to_string(),
                        ))
                        .await;
                }
                break;
            };

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            // Half-duplex gate: checked at forward time, per frame.
            if self.turn.model_speaking() {
                trace!("Model speaking; discarding captured frame");
                continue;
            }

            let pcm = codec::samples_to_bytes(&frame.samples);
            if let Err(e) = self.sink.send_audio_chunk(&pcm).await {
                // The connection reports its own fault; just stop pumping.
                debug!("Outbound audio sink is gone: {e:#}");
                break;
            }
            self.frames_sent.fetch_add(1, Ordering::SeqCst);
        }

        info!("Capture loop stopped");
    }
}

/// WAV-file capture backend
///
/// Reads a 16 kHz mono 16-bit WAV file and replays it at real-time pace,
/// then keeps producing silence until stopped. Stands in for a physical
/// microphone in development and batch testing.
pub struct WavFileCapture {
    path: PathBuf,
    frame_duration_ms: u64,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WavFileCapture {
    pub fn new(path: impl AsRef<Path>, frame_duration_ms: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            frame_duration_ms,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn read_samples(&self) -> Result<(Vec<i16>, u32, u16)> {
        let reader = hound::WavReader::open(&self.path)
            .with_context(|| format!("Failed to open WAV file: {}", self.path.display()))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;
        Ok((samples, spec.sample_rate, spec.channels))
    }
}

#[async_trait::async_trait]
impl CaptureBackend for WavFileCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (samples, sample_rate, channels) = self.read_samples()?;
        if channels != 1 {
            anyhow::bail!("Expected mono WAV input, got {} channels", channels);
        }

        info!(
            "WAV capture started: {} ({:.1}s at {}Hz)",
            self.path.display(),
            samples.len() as f64 / sample_rate as f64,
            sample_rate
        );

        let frame_len = (sample_rate as u64 * self.frame_duration_ms / 1000) as usize;
        let frame_duration = Duration::from_millis(self.frame_duration_ms);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut offset = 0usize;
            let mut timestamp_ms = 0u64;
            let mut exhausted = false;

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;

                let frame_samples = if offset < samples.len() {
                    let end = (offset + frame_len).min(samples.len());
                    let mut chunk = samples[offset..end].to_vec();
                    chunk.resize(frame_len, 0);
                    offset = end;
                    chunk
                } else {
                    if !exhausted {
                        debug!("WAV input exhausted; producing silence");
                        exhausted = true;
                    }
                    vec![0i16; frame_len]
                };

                let frame = AudioFrame {
                    samples: frame_samples,
                    sample_rate,
                    channels: 1,
                    timestamp_ms,
                };
                timestamp_ms += frame_duration.as_millis() as u64;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        self.task = Some(task);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.await.context("Capture task panicked")?;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
