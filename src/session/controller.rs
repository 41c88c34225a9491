use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{CaptureBackend, CaptureLoop, CaptureSink, PlaybackBackend, PlaybackSink};
use crate::conversation::ConversationLog;
use crate::protocol::{self, ConnectOptions, RealtimeHandle};
use crate::vision::{CameraBackend, ContextSink, VisionAugmenter, VisionDescriber};

use super::config::SessionConfig;
use super::stats::SessionStats;
use super::turn::TurnState;
use super::SessionFault;

/// Device and endpoint collaborators supplied by the embedding caller.
pub struct SessionCollaborators {
    pub capture: Box<dyn CaptureBackend>,
    pub playback: Box<dyn PlaybackBackend>,
    pub camera: Box<dyn CameraBackend>,
    pub describer: Arc<dyn VisionDescriber>,
}

/// Everything owned by one active session.
struct ActiveSession {
    handle: RealtimeHandle,
    connection_task: JoinHandle<()>,
    capture_backend: Box<dyn CaptureBackend>,
    capture_task: JoinHandle<()>,
    playback_task: JoinHandle<()>,
    vision_stop: watch::Sender<bool>,
    vision_task: JoinHandle<()>,
}

const FAULT_CHANNEL_CAPACITY: usize = 16;
const PLAYBACK_CHANNEL_CAPACITY: usize = 32;

/// Composition root for one conversational session.
///
/// `start` brings the components up in dependency order (connection,
/// playback, capture, vision); `stop` tears them down in reverse and is
/// idempotent, safe to call from error paths. Component faults arrive on
/// the channel returned by `take_faults`; what to do about them (stop,
/// restart) is the caller's policy.
pub struct SessionController {
    connect_options: ConnectOptions,
    session_config: SessionConfig,
    vision_interval: Duration,

    conversation: Arc<ConversationLog>,
    turn: TurnState,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveSession>>,
    started_at: Mutex<Option<DateTime<Utc>>>,

    faults_tx: mpsc::Sender<SessionFault>,
    faults_rx: Mutex<Option<mpsc::Receiver<SessionFault>>>,

    frames_sent: Arc<AtomicUsize>,
    vision_descriptions: Arc<AtomicUsize>,
}

impl SessionController {
    pub fn new(
        connect_options: ConnectOptions,
        session_config: SessionConfig,
        vision_interval: Duration,
    ) -> Self {
        let (faults_tx, faults_rx) = mpsc::channel(FAULT_CHANNEL_CAPACITY);
        Self {
            connect_options,
            session_config,
            vision_interval,
            conversation: Arc::new(ConversationLog::new()),
            turn: TurnState::new(),
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
            started_at: Mutex::new(None),
            faults_tx,
            faults_rx: Mutex::new(Some(faults_rx)),
            frames_sent: Arc::new(AtomicUsize::new(0)),
            vision_descriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The transcript this session writes into.
    pub fn conversation(&self) -> Arc<ConversationLog> {
        Arc::clone(&self.conversation)
    }

    /// Take the fault receiver. Yields `None` after the first call.
    pub async fn take_faults(&self) -> Option<mpsc::Receiver<SessionFault>> {
        self.faults_rx.lock().await.take()
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the session.
    ///
    /// The connection must be establishing before capture begins sending,
    /// so component order is: connection, playback sink, capture, vision.
    /// A failure partway unwinds whatever already started.
    pub async fn start(&self, collaborators: SessionCollaborators) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Session already started");
            return Ok(());
        }

        info!("Starting session: {}", self.session_config.session_id);
        match self.bring_up(collaborators).await {
            Ok(active) => {
                *self.active.lock().await = Some(active);
                *self.started_at.lock().await = Some(Utc::now());
                info!("Session started successfully");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn bring_up(&self, collaborators: SessionCollaborators) -> Result<ActiveSession> {
        let SessionCollaborators {
            mut capture,
            playback,
            camera,
            describer,
        } = collaborators;

        let (playback_tx, playback_rx) = mpsc::channel(PLAYBACK_CHANNEL_CAPACITY);

        let (handle, connection_task) = protocol::connect(
            &self.connect_options,
            &self.session_config,
            Arc::clone(&self.conversation),
            self.turn.clone(),
            playback_tx,
            self.faults_tx.clone(),
        )
        .await
        .context("Failed to open realtime connection")?;

        let playback_task = tokio::spawn(
            PlaybackSink::new(playback, playback_rx, self.faults_tx.clone()).run(),
        );

        let frames = match capture.start().await {
            Ok(frames) => frames,
            Err(e) => {
                // Unwind: close the connection; the playback channel
                // closes with it and the sink drains out.
                handle.shutdown().await;
                let _ = connection_task.await;
                let _ = playback_task.await;
                return Err(e).context("Failed to start audio capture");
            }
        };
        let capture_sink: Arc<dyn CaptureSink> = Arc::new(handle.clone());
        let capture_task = tokio::spawn(
            CaptureLoop::new(
                frames,
                self.turn.clone(),
                capture_sink,
                Arc::clone(&self.running),
                self.faults_tx.clone(),
                Arc::clone(&self.frames_sent),
            )
            .run(),
        );

        let (vision_stop, vision_stop_rx) = watch::channel(false);
        let context_sink: Arc<dyn ContextSink> = Arc::new(handle.clone());
        let vision_task = tokio::spawn(
            VisionAugmenter::new(
                camera,
                describer,
                Arc::clone(&self.conversation),
                context_sink,
                self.vision_interval,
                Arc::clone(&self.vision_descriptions),
            )
            .run(vision_stop_rx),
        );

        Ok(ActiveSession {
            handle,
            connection_task,
            capture_backend: capture,
            capture_task,
            playback_task,
            vision_stop,
            vision_task,
        })
    }

    /// Stop the session. Idempotent; later calls are no-ops.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Session not active");
            return Ok(());
        }

        info!("Stopping session: {}", self.session_config.session_id);

        let Some(mut active) = self.active.lock().await.take() else {
            return Ok(());
        };

        // Vision first: no new cycle may start during teardown.
        let _ = active.vision_stop.send(true);
        if let Err(e) = active.vision_task.await {
            error!("Vision task panicked: {}", e);
        }

        // Capture next: stop the device, then let the loop drain out.
        if let Err(e) = active.capture_backend.stop().await {
            error!("Failed to stop capture backend: {:#}", e);
        }
        if let Err(e) = active.capture_task.await {
            error!("Capture task panicked: {}", e);
        }

        // Close the connection with a normal closure code. The playback
        // channel closes with the connection task, which releases the
        // output device after the remaining chunks are rendered.
        active.handle.shutdown().await;
        if let Err(e) = active.connection_task.await {
            error!("Connection task panicked: {}", e);
        }
        if let Err(e) = active.playback_task.await {
            error!("Playback task panicked: {}", e);
        }

        self.conversation.notify_session_ended();
        info!("Session stopped successfully");

        Ok(())
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        let started_at = (*self.started_at.lock().await).unwrap_or_else(Utc::now);
        let duration = Utc::now().signed_duration_since(started_at);

        SessionStats {
            is_active: self.is_active(),
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            vision_descriptions: self.vision_descriptions.load(Ordering::SeqCst),
            transcript_messages: self.conversation.len().await,
        }
    }
}
