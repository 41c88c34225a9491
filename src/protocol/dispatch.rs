//! Inbound event routing
//!
//! `EventRouter` is called from the connection task only, one event at a
//! time in arrival order, so turn-taking transitions and transcript
//! mutations never interleave. Routing may produce an immediate outbound
//! reply (the commit that answers a completed transcription), which the
//! connection task sends before processing the next event.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::audio::codec;
use crate::conversation::{ConversationLog, Role};
use crate::session::TurnState;

use super::events::{ClientEvent, ServerEvent};

pub struct EventRouter {
    conversation: Arc<ConversationLog>,
    turn: TurnState,
    playback: mpsc::Sender<Vec<i16>>,
}

impl EventRouter {
    pub fn new(
        conversation: Arc<ConversationLog>,
        turn: TurnState,
        playback: mpsc::Sender<Vec<i16>>,
    ) -> Self {
        Self {
            conversation,
            turn,
            playback,
        }
    }

    /// Route one inbound event; returns an event to send back, if any.
    pub async fn route(&self, event: ServerEvent) -> Option<ClientEvent> {
        match event {
            ServerEvent::ItemCreated { item } => {
                if item.is_assistant() {
                    self.conversation.append(Role::Assistant, "").await;
                    debug!("Assistant turn opened");
                }
                None
            }

            ServerEvent::TranscriptionCompleted { transcript } => {
                debug!("Input transcription completed: {}", transcript);
                Some(ClientEvent::CommitAudio)
            }

            ServerEvent::TextDelta { delta } => {
                if !self.conversation.extend_last_assistant(&delta).await {
                    // The service is expected to send item.created before
                    // any delta; tolerate the inconsistency.
                    warn!("Text delta with no open assistant message; dropped");
                }
                None
            }

            ServerEvent::AudioDelta { delta } => {
                self.turn.set_model_speaking(true);
                match codec::decode_pcm(&delta) {
                    Ok(bytes) => {
                        let samples = codec::bytes_to_samples(&bytes);
                        // Never block inbound dispatch on the playback
                        // device; a stalled sink costs audio, not ordering.
                        if let Err(e) = self.playback.try_send(samples) {
                            warn!("Playback sink not keeping up, dropping chunk: {}", e);
                        }
                    }
                    Err(e) => warn!("Undecodable audio delta dropped: {}", e),
                }
                None
            }

            ServerEvent::AudioDone {} => {
                self.turn.set_model_speaking(false);
                debug!("Model audio done");
                None
            }

            ServerEvent::Unrecognized => {
                trace!("Ignoring unrecognized server event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> (EventRouter, Arc<ConversationLog>, TurnState, mpsc::Receiver<Vec<i16>>) {
        let conversation = Arc::new(ConversationLog::new());
        let turn = TurnState::new();
        let (playback_tx, playback_rx) = mpsc::channel(8);
        let router = EventRouter::new(Arc::clone(&conversation), turn.clone(), playback_tx);
        (router, conversation, turn, playback_rx)
    }

    fn assistant_created() -> ServerEvent {
        serde_json::from_str(
            r#"{"type":"conversation.item.created","item":{"role":"assistant"}}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn deltas_accumulate_into_one_assistant_message() {
        let (router, conversation, _, _rx) = router();

        router.route(assistant_created()).await;
        router
            .route(ServerEvent::TextDelta { delta: "Hi".into() })
            .await;
        router
            .route(ServerEvent::TextDelta { delta: " there".into() })
            .await;

        let snapshot = conversation.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].role, Role::Assistant);
        assert_eq!(snapshot[0].text, "Hi there");
    }

    #[tokio::test]
    async fn orphan_delta_is_dropped_not_appended() {
        let (router, conversation, _, _rx) = router();

        router
            .route(ServerEvent::TextDelta { delta: "orphan".into() })
            .await;

        assert!(conversation.is_empty().await);
    }

    #[tokio::test]
    async fn model_speaking_spans_delta_to_done() {
        let (router, _, turn, mut playback_rx) = router();
        assert!(!turn.model_speaking());

        let pcm = codec::encode_pcm(&codec::samples_to_bytes(&[1i16, 2, 3]));
        router.route(ServerEvent::AudioDelta { delta: pcm }).await;
        assert!(turn.model_speaking());
        assert_eq!(playback_rx.recv().await.unwrap(), vec![1i16, 2, 3]);

        router.route(ServerEvent::AudioDone {}).await;
        assert!(!turn.model_speaking());
    }

    #[tokio::test]
    async fn transcription_completed_replies_with_commit() {
        let (router, _, _, _rx) = router();

        let reply = router
            .route(ServerEvent::TranscriptionCompleted {
                transcript: "hello".into(),
            })
            .await;

        assert!(matches!(reply, Some(ClientEvent::CommitAudio)));
    }

    #[tokio::test]
    async fn non_assistant_item_does_not_open_a_turn() {
        let (router, conversation, _, _rx) = router();

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.created","item":{"role":"user"}}"#,
        )
        .unwrap();
        router.route(event).await;

        assert!(conversation.is_empty().await);
    }
}
