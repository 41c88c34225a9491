//! Realtime connection client
//!
//! Owns the one long-lived WebSocket to the conversational service. A
//! single task holds the socket: outbound traffic arrives over a command
//! channel, inbound messages are parsed and routed in arrival order, and
//! replies produced by routing are sent before the next event is read.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::audio::codec;
use crate::conversation::ConversationLog;
use crate::session::{SessionConfig, SessionFault, TurnState};

use super::dispatch::EventRouter;
use super::events::{ClientEvent, ResponseSpec, ServerEvent, SessionProfile};

/// Connection lifecycle. `Failed` is terminal for this connection
/// instance; reconnect policy belongs to the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    Failed,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Failed,
        }
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// How to reach the realtime endpoint.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// WebSocket URL including the model query parameter
    pub url: String,

    /// Bearer token for the Authorization header
    pub api_key: String,

    /// Connection establishment timeout; the open connection itself has
    /// no read timeout (long-lived streaming by design)
    pub connect_timeout: Duration,
}

enum Command {
    Audio(String),
    VisionContext(String),
    Shutdown,
}

/// Outbound surface of the connection, shared by the capture and vision
/// loops. All operations are no-ops (logged) when the connection is not
/// open.
#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::Sender<Command>,
    state: Arc<StateCell>,
}

impl RealtimeHandle {
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Queue one captured PCM chunk for transmission.
    ///
    /// Best-effort: encoding and queueing only; the connection task does
    /// the socket write. Returns an error only when the connection task
    /// is gone.
    pub async fn send_audio_chunk(&self, pcm: &[u8]) -> Result<()> {
        if self.state.get() != ConnectionState::Open {
            warn!("Connection not open; dropping audio chunk");
            return Ok(());
        }
        self.commands
            .send(Command::Audio(codec::encode_pcm(pcm)))
            .await
            .context("Connection task is gone")
    }

    /// Queue a response request carrying a vision description.
    pub async fn send_vision_context(&self, description: &str) -> Result<()> {
        if self.state.get() != ConnectionState::Open {
            warn!("Connection not open; dropping vision context");
            return Ok(());
        }
        self.commands
            .send(Command::VisionContext(description.to_string()))
            .await
            .context("Connection task is gone")
    }

    /// Ask the connection task to close with a normal closure code.
    pub async fn shutdown(&self) {
        // A dropped task already means the connection is down.
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

#[async_trait::async_trait]
impl crate::audio::CaptureSink for RealtimeHandle {
    async fn send_audio_chunk(&self, pcm: &[u8]) -> Result<()> {
        RealtimeHandle::send_audio_chunk(self, pcm).await
    }
}

#[async_trait::async_trait]
impl crate::vision::ContextSink for RealtimeHandle {
    async fn send_vision_context(&self, description: &str) -> Result<()> {
        RealtimeHandle::send_vision_context(self, description).await
    }
}

/// Open the realtime connection and spawn its task.
///
/// On success the connection is in `Open` state and exactly one
/// `session.update` carrying `session` has been sent.
pub async fn connect(
    options: &ConnectOptions,
    session: &SessionConfig,
    conversation: Arc<ConversationLog>,
    turn: TurnState,
    playback: mpsc::Sender<Vec<i16>>,
    faults: mpsc::Sender<SessionFault>,
) -> Result<(RealtimeHandle, JoinHandle<()>)> {
    let state = Arc::new(StateCell::new());
    state.set(ConnectionState::Connecting);

    let mut request = options
        .url
        .as_str()
        .into_client_request()
        .context("Invalid realtime endpoint URL")?;
    let headers = request.headers_mut();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", options.api_key))
            .context("API key is not a valid header value")?,
    );
    headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    info!("Connecting to realtime endpoint");
    let connect = tokio_tungstenite::connect_async(request);
    let (mut ws, _response) = match tokio::time::timeout(options.connect_timeout, connect).await {
        Ok(Ok(ok)) => ok,
        Ok(Err(e)) => {
            state.set(ConnectionState::Failed);
            return Err(e).context("Realtime connection failed to open");
        }
        Err(_) => {
            state.set(ConnectionState::Failed);
            anyhow::bail!(
                "Realtime connection timed out after {:?}",
                options.connect_timeout
            );
        }
    };

    state.set(ConnectionState::Open);
    info!("Realtime connection open");

    // The one and only session configuration message for this connection.
    let update = ClientEvent::SessionUpdate {
        session: SessionProfile::from_config(session),
    };
    if let Err(e) = send_event(&mut ws, &update).await {
        state.set(ConnectionState::Failed);
        return Err(e).context("Failed to send session configuration");
    }
    debug!("Session configuration sent");

    let (commands, command_rx) = mpsc::channel(64);
    let router = EventRouter::new(conversation, turn, playback);
    let task = tokio::spawn(run_connection(
        ws,
        command_rx,
        router,
        session.clone(),
        Arc::clone(&state),
        faults,
    ));

    Ok((RealtimeHandle { commands, state }, task))
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn send_event(ws: &mut WsStream, event: &ClientEvent) -> Result<()> {
    let text = serde_json::to_string(event).context("Failed to serialize outbound event")?;
    ws.send(Message::Text(text))
        .await
        .context("WebSocket send failed")
}

async fn run_connection(
    mut ws: WsStream,
    mut commands: mpsc::Receiver<Command>,
    router: EventRouter,
    session: SessionConfig,
    state: Arc<StateCell>,
    faults: mpsc::Sender<SessionFault>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let outbound = match command {
                    Some(Command::Audio(audio)) => ClientEvent::AppendAudio { audio },
                    Some(Command::VisionContext(description)) => ClientEvent::CreateResponse {
                        response: ResponseSpec::vision_context(&session, &description),
                    },
                    Some(Command::Shutdown) | None => {
                        let _ = ws
                            .close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            }))
                            .await;
                        state.set(ConnectionState::Closed);
                        info!("Realtime connection closed");
                        return;
                    }
                };
                if let Err(e) = send_event(&mut ws, &outbound).await {
                    fail(&state, &faults, format!("send failed: {e:#}")).await;
                    return;
                }
            }

            inbound = ws.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if let Some(reply) = router.route(event).await {
                                    if let Err(e) = send_event(&mut ws, &reply).await {
                                        fail(&state, &faults, format!("send failed: {e:#}")).await;
                                        return;
                                    }
                                }
                            }
                            Err(e) => warn!("Unparseable server event dropped: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = ws.send(Message::Pong(payload)).await {
                            fail(&state, &faults, format!("pong failed: {e:#}")).await;
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Server closed the connection: {:?}", frame);
                        state.set(ConnectionState::Closed);
                        let _ = faults
                            .send(SessionFault::Connection("closed by server".to_string()))
                            .await;
                        return;
                    }
                    Some(Ok(other)) => {
                        trace!("Ignoring non-text frame: {:?}", other);
                    }
                    Some(Err(e)) => {
                        fail(&state, &faults, format!("receive failed: {e:#}")).await;
                        return;
                    }
                    None => {
                        fail(&state, &faults, "connection ended unexpectedly".to_string()).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn fail(state: &StateCell, faults: &mpsc::Sender<SessionFault>, reason: String) {
    error!("Realtime connection failed: {}", reason);
    state.set(ConnectionState::Failed);
    let _ = faults.send(SessionFault::Connection(reason)).await;
}
