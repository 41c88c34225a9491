//! Periodic vision augmentation
//!
//! On a fixed period: capture one frame, ask the vision endpoint for a
//! description, and on success feed it into both the transcript and the
//! realtime connection. A failed step aborts only that cycle; the
//! interval never changes and at most one cycle is in flight (a slow
//! cycle delays the next tick instead of overlapping it).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationLog, Role};

use super::camera::CameraBackend;
use super::client::VisionDescriber;

/// Where successful cycles send the description as conversation context.
///
/// Implemented by the realtime connection handle; tests substitute a
/// recording sink.
#[async_trait::async_trait]
pub trait ContextSink: Send + Sync {
    async fn send_vision_context(&self, description: &str) -> Result<()>;
}

pub struct VisionAugmenter {
    camera: Box<dyn CameraBackend>,
    describer: Arc<dyn VisionDescriber>,
    conversation: Arc<ConversationLog>,
    sink: Arc<dyn ContextSink>,
    interval: Duration,
    descriptions: Arc<AtomicUsize>,
}

impl VisionAugmenter {
    pub fn new(
        camera: Box<dyn CameraBackend>,
        describer: Arc<dyn VisionDescriber>,
        conversation: Arc<ConversationLog>,
        sink: Arc<dyn ContextSink>,
        interval: Duration,
        descriptions: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            camera,
            describer,
            conversation,
            sink,
            interval,
            descriptions,
        }
    }

    /// Run until the stop signal fires. An in-flight cycle is abandoned
    /// on stop; a new one is never started after it.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!("Vision augmentation started (every {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if *stop.borrow() {
                        break;
                    }
                    let mut stop_inflight = stop.clone();
                    tokio::select! {
                        _ = stop_inflight.changed() => break,
                        result = self.cycle() => match result {
                            Ok(true) => {
                                self.descriptions.fetch_add(1, Ordering::SeqCst);
                            }
                            Ok(false) => debug!("Vision cycle produced no description"),
                            // Next cycle runs on schedule regardless.
                            Err(e) => warn!("Vision cycle failed: {e:#}"),
                        }
                    }
                }
            }
        }

        info!("Vision augmentation stopped");
    }

    async fn cycle(&mut self) -> Result<bool> {
        let jpeg = self
            .camera
            .capture_jpeg()
            .await
            .context("Frame capture failed")?;

        let Some(description) = self.describer.describe(&jpeg).await? else {
            return Ok(false);
        };

        debug!("Vision description: {}", description);
        self.conversation
            .append(Role::System, format!("Image Description: {description}"))
            .await;
        self.sink
            .send_vision_context(&description)
            .await
            .context("Failed to send vision context")?;

        Ok(true)
    }
}
