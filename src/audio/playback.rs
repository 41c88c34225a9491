//! Speech playback
//!
//! `PlaybackBackend` is the seam to the output device. `PlaybackSink`
//! drains decoded PCM chunks (24 kHz, mono, 16-bit) from the dispatcher
//! in arrival order, opening the device lazily on the first chunk and
//! releasing it when the channel closes at teardown. Backpressure comes
//! from the device write itself; there is no buffering here beyond the
//! channel. A WAV-file backend is included for development and tests.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::session::SessionFault;

/// Audio output backend trait
#[async_trait::async_trait]
pub trait PlaybackBackend: Send {
    /// Acquire the output device
    async fn open(&mut self) -> Result<()>;

    /// Render one chunk of samples; blocks until the device accepts it
    async fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Release the output device
    async fn close(&mut self) -> Result<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Renders decoded model speech in the order received.
pub struct PlaybackSink {
    backend: Box<dyn PlaybackBackend>,
    chunks: mpsc::Receiver<Vec<i16>>,
    faults: mpsc::Sender<SessionFault>,
}

impl PlaybackSink {
    pub fn new(
        backend: Box<dyn PlaybackBackend>,
        chunks: mpsc::Receiver<Vec<i16>>,
        faults: mpsc::Sender<SessionFault>,
    ) -> Self {
        Self {
            backend,
            chunks,
            faults,
        }
    }

    /// Run until the chunk channel closes or the device fails.
    pub async fn run(mut self) {
        let mut opened = false;

        while let Some(chunk) = self.chunks.recv().await {
            if !opened {
                if let Err(e) = self.backend.open().await {
                    let _ = self
                        .faults
                        .send(SessionFault::Playback(format!("device open failed: {e:#}")))
                        .await;
                    return;
                }
                info!("Playback device acquired: {}", self.backend.name());
                opened = true;
            }

            if let Err(e) = self.backend.write(&chunk).await {
                let _ = self
                    .faults
                    .send(SessionFault::Playback(format!("device write failed: {e:#}")))
                    .await;
                return;
            }
        }

        if opened {
            if let Err(e) = self.backend.close().await {
                warn!("Playback device release failed: {e:#}");
            } else {
                info!("Playback device released");
            }
        }
    }
}

/// WAV-file playback backend
///
/// Writes the model's speech to a WAV file instead of a speaker. Stands
/// in for a physical output device in development and batch testing.
pub struct WavFilePlayback {
    path: PathBuf,
    sample_rate: u32,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFilePlayback {
    pub fn new(path: impl AsRef<Path>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sample_rate,
            writer: None,
        }
    }
}

#[async_trait::async_trait]
impl PlaybackBackend for WavFilePlayback {
    async fn open(&mut self) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", self.path.display()))?;
        self.writer = Some(writer);
        Ok(())
    }

    async fn write(&mut self, samples: &[i16]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .context("Playback WAV file is not open")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write audio sample")?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_chunks_in_order_and_finalizes_on_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");

        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let (fault_tx, mut fault_rx) = mpsc::channel(4);
        let sink = PlaybackSink::new(
            Box::new(WavFilePlayback::new(&path, 24_000)),
            chunk_rx,
            fault_tx,
        );
        let task = tokio::spawn(sink.run());

        chunk_tx.send(vec![1i16, 2, 3]).await.unwrap();
        chunk_tx.send(vec![4i16, 5]).await.unwrap();
        drop(chunk_tx);
        task.await.unwrap();

        assert!(fault_rx.try_recv().is_err());

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn no_chunks_means_device_never_acquired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.wav");

        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<i16>>(1);
        let (fault_tx, _fault_rx) = mpsc::channel(4);
        let sink = PlaybackSink::new(
            Box::new(WavFilePlayback::new(&path, 24_000)),
            chunk_rx,
            fault_tx,
        );
        let task = tokio::spawn(sink.run());

        drop(chunk_tx);
        task.await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn open_failure_is_reported_as_playback_fault() {
        let (chunk_tx, chunk_rx) = mpsc::channel(1);
        let (fault_tx, mut fault_rx) = mpsc::channel(4);
        // Parent directory does not exist, so open fails.
        let sink = PlaybackSink::new(
            Box::new(WavFilePlayback::new("/nonexistent/dir/out.wav", 24_000)),
            chunk_rx,
            fault_tx,
        );
        let task = tokio::spawn(sink.run());

        chunk_tx.send(vec![0i16; 4]).await.unwrap();
        task.await.unwrap();

        assert!(matches!(
            fault_rx.recv().await,
            Some(SessionFault::Playback(_))
        ));
    }
}
