// Tests for session controller lifecycle invariants that hold without a
// live connection.

use std::time::Duration;

use parley_live::{ConnectOptions, ConversationUpdate, SessionConfig, SessionController};

fn controller() -> SessionController {
    SessionController::new(
        ConnectOptions {
            url: "ws://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            connect_timeout: Duration::from_secs(1),
        },
        SessionConfig::default(),
        Duration::from_millis(3500),
    )
}

#[tokio::test]
async fn stop_is_idempotent() {
    let controller = controller();

    assert!(controller.stop().await.is_ok());
    assert!(controller.stop().await.is_ok());
    assert!(!controller.is_active());
}

#[tokio::test]
async fn stop_without_start_notifies_no_observer() {
    let controller = controller();
    let mut updates = controller.conversation().subscribe();

    controller.stop().await.unwrap();
    controller.stop().await.unwrap();

    // No session ever ran, so no teardown side effects are visible.
    assert!(matches!(
        updates.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn fault_receiver_is_taken_once() {
    let controller = controller();

    assert!(controller.take_faults().await.is_some());
    assert!(controller.take_faults().await.is_none());
}

#[tokio::test]
async fn failed_start_leaves_the_controller_inactive() {
    // Port 9 (discard) is not listening; the connection cannot open.
    let controller = controller();
    let collaborators = parley_live::SessionCollaborators {
        capture: Box::new(parley_live::WavFileCapture::new("/nonexistent.wav", 100)),
        playback: Box::new(parley_live::WavFilePlayback::new("/nonexistent/out.wav", 24_000)),
        camera: Box::new(parley_live::StillImageCamera::new("/nonexistent.jpg")),
        describer: std::sync::Arc::new(NoDescriber),
    };

    assert!(controller.start(collaborators).await.is_err());
    assert!(!controller.is_active());

    // A failed start is still safe to stop.
    assert!(controller.stop().await.is_ok());
}

struct NoDescriber;

#[async_trait::async_trait]
impl parley_live::VisionDescriber for NoDescriber {
    async fn describe(&self, _jpeg: &[u8]) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[tokio::test]
async fn stats_reflect_inactive_session() {
    let controller = controller();
    let stats = controller.stats().await;

    assert!(!stats.is_active);
    assert_eq!(stats.frames_sent, 0);
    assert_eq!(stats.vision_descriptions, 0);
    assert_eq!(stats.transcript_messages, 0);
}

#[tokio::test]
async fn observer_updates_are_typed() {
    let controller = controller();
    let conversation = controller.conversation();
    let mut updates = conversation.subscribe();

    conversation
        .append(parley_live::Role::System, "Image Description: a lamp")
        .await;

    match updates.recv().await.unwrap() {
        ConversationUpdate::Appended { role, text, .. } => {
            assert_eq!(role, parley_live::Role::System);
            assert_eq!(text, "Image Description: a lamp");
        }
        other => panic!("unexpected update: {other:?}"),
    }
}
