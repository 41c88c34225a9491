use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Camera collaborator trait
///
/// One still frame per call, JPEG-encoded. The session core never holds
/// the camera open between cycles; preview wiring and permissions belong
/// to the embedding application.
#[async_trait::async_trait]
pub trait CameraBackend: Send {
    /// Capture one still frame as JPEG bytes
    async fn capture_jpeg(&mut self) -> Result<Vec<u8>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Still-image camera backend
///
/// Re-reads a JPEG file on every cycle. Stands in for a physical camera
/// in development and batch testing.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl CameraBackend for StillImageCamera {
    async fn capture_jpeg(&mut self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read frame image: {}", self.path.display()))
    }

    fn name(&self) -> &str {
        "still-image"
    }
}
