// Integration tests for the realtime protocol client.
//
// A scripted in-process WebSocket server stands in for the conversational
// service; the client under test connects over loopback.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use futures::{SinkExt, StreamExt};
use parley_live::protocol;
use parley_live::{ConnectOptions, ConnectionState, ConversationLog, Role, SessionConfig, TurnState};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerWs = WebSocketStream<TcpStream>;

async fn accept_one(listener: TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_json(ws: &mut ServerWs) -> serde_json::Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(_) => panic!("connection closed while expecting a message"),
            _ => continue,
        }
    }
}

async fn send_json(ws: &mut ServerWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

struct ClientSide {
    handle: parley_live::RealtimeHandle,
    task: tokio::task::JoinHandle<()>,
    conversation: Arc<ConversationLog>,
    turn: TurnState,
    playback_rx: mpsc::Receiver<Vec<i16>>,
    faults_rx: mpsc::Receiver<parley_live::SessionFault>,
}

async fn connect_client(addr: std::net::SocketAddr) -> ClientSide {
    let conversation = Arc::new(ConversationLog::new());
    let turn = TurnState::new();
    let (playback_tx, playback_rx) = mpsc::channel(8);
    let (faults_tx, faults_rx) = mpsc::channel(8);

    let options = ConnectOptions {
        url: format!("ws://{addr}"),
        api_key: "test-key".to_string(),
        connect_timeout: Duration::from_secs(5),
    };
    let (handle, task) = protocol::connect(
        &options,
        &SessionConfig::default(),
        Arc::clone(&conversation),
        turn.clone(),
        playback_tx,
        faults_tx,
    )
    .await
    .unwrap();

    ClientSide {
        handle,
        task,
        conversation,
        turn,
        playback_rx,
        faults_rx,
    }
}

#[tokio::test]
async fn sends_exactly_one_session_update_then_audio() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;

        // The first frame after the handshake must be the session
        // configuration.
        let update = next_json(&mut ws).await;
        assert_eq!(update["type"], "session.update");
        assert_eq!(update["session"]["voice"], "alloy");
        assert_eq!(update["session"]["input_audio_format"], "pcm16");
        assert_eq!(
            update["session"]["input_audio_transcription"]["model"],
            "whisper-1"
        );
        assert_eq!(update["session"]["turn_detection"]["type"], "server_vad");

        let append = next_json(&mut ws).await;
        assert_eq!(append["type"], "input_audio_buffer.append");
        let audio = base64::engine::general_purpose::STANDARD
            .decode(append["audio"].as_str().unwrap())
            .unwrap();
        assert_eq!(audio, vec![0x01, 0x02, 0x03, 0x04]);

        let vision = next_json(&mut ws).await;
        assert_eq!(vision["type"], "response.create");
        assert!(vision["response"]["instructions"]
            .as_str()
            .unwrap()
            .contains("a red car"));

        // Expect a normal closure next.
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    });

    let client = connect_client(addr).await;
    assert_eq!(client.handle.state(), ConnectionState::Open);

    client
        .handle
        .send_audio_chunk(&[0x01, 0x02, 0x03, 0x04])
        .await
        .unwrap();
    client.handle.send_vision_context("a red car").await.unwrap();

    client.handle.shutdown().await;
    client.task.await.unwrap();
    assert_eq!(client.handle.state(), ConnectionState::Closed);

    server.await.unwrap();
}

#[tokio::test]
async fn routes_inbound_events_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pcm_b64 = base64::engine::general_purpose::STANDARD.encode([10u8, 0, 20, 0]);

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        let _update = next_json(&mut ws).await;

        send_json(
            &mut ws,
            serde_json::json!({
                "type": "conversation.item.created",
                "item": {"id": "item_1", "role": "assistant"}
            }),
        )
        .await;
        send_json(
            &mut ws,
            serde_json::json!({"type": "response.text.delta", "delta": "Hi"}),
        )
        .await;
        send_json(
            &mut ws,
            serde_json::json!({"type": "response.text.delta", "delta": " there"}),
        )
        .await;
        send_json(
            &mut ws,
            serde_json::json!({"type": "response.audio.delta", "delta": pcm_b64}),
        )
        .await;
        send_json(&mut ws, serde_json::json!({"type": "response.audio.done"})).await;

        // A completed input transcription must be answered with a commit;
        // receiving it also proves everything above was processed.
        send_json(
            &mut ws,
            serde_json::json!({
                "type": "conversation.item.input_audio_transcription.completed",
                "transcript": "hello model"
            }),
        )
        .await;
        let commit = next_json(&mut ws).await;
        assert_eq!(commit["type"], "input_audio_buffer.commit");

        // Keep the connection up until the client closes it.
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    });

    let mut client = connect_client(addr).await;

    // Playback receives the decoded delta; model_speaking is set before
    // the samples are forwarded.
    let samples = client.playback_rx.recv().await.unwrap();
    assert_eq!(samples, vec![10i16, 20]);
    assert!(client.turn.model_speaking());

    // audio.done is dispatched strictly after the delta above.
    while client.turn.model_speaking() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let snapshot = client.conversation.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].role, Role::Assistant);
    assert_eq!(snapshot[0].text, "Hi there");

    client.handle.shutdown().await;
    client.task.await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn unrecognized_events_are_ignored() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        let _update = next_json(&mut ws).await;

        send_json(
            &mut ws,
            serde_json::json!({"type": "rate_limits.updated", "rate_limits": []}),
        )
        .await;
        send_json(
            &mut ws,
            serde_json::json!({"type": "response.text.delta", "delta": "orphan"}),
        )
        .await;
        // A recognizable event last, as a processing barrier.
        send_json(
            &mut ws,
            serde_json::json!({
                "type": "conversation.item.created",
                "item": {"id": "item_9", "role": "assistant"}
            }),
        )
        .await;

        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    });

    let client = connect_client(addr).await;

    while client.conversation.is_empty().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The unknown event and the orphan delta both left no trace; only the
    // barrier item opened a message.
    let snapshot = client.conversation.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].text, "");

    client.handle.shutdown().await;
    client.task.await.unwrap();
    assert_eq!(client.handle.state(), ConnectionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn abrupt_server_loss_is_a_terminal_connection_fault() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(listener).await;
        let _update = next_json(&mut ws).await;
        // Drop without a closing handshake.
    });

    let mut client = connect_client(addr).await;
    server.await.unwrap();

    let fault = client.faults_rx.recv().await.unwrap();
    assert!(matches!(fault, parley_live::SessionFault::Connection(_)));

    client.task.await.unwrap();
    assert_eq!(client.handle.state(), ConnectionState::Failed);

    // Outbound operations after failure are reported no-ops, not errors.
    assert!(client.handle.send_audio_chunk(&[0, 0]).await.is_ok());
}

#[tokio::test]
async fn connect_to_unreachable_endpoint_fails() {
    let conversation = Arc::new(ConversationLog::new());
    let (playback_tx, _playback_rx) = mpsc::channel(1);
    let (faults_tx, _faults_rx) = mpsc::channel(1);

    // Bind a listener and drop it so the port is closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let options = ConnectOptions {
        url: format!("ws://{addr}"),
        api_key: "test-key".to_string(),
        connect_timeout: Duration::from_secs(5),
    };
    let result = protocol::connect(
        &options,
        &SessionConfig::default(),
        conversation,
        TurnState::new(),
        playback_tx,
        faults_tx,
    )
    .await;

    assert!(result.is_err());
}
