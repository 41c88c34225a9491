use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared half-duplex turn-taking flag.
///
/// Written only by the inbound event dispatcher (true on the first audio
/// delta of a response, false on audio-done) and read by the capture loop
/// before every forwarded frame. While the model is speaking, captured
/// microphone frames are discarded instead of transmitted.
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    model_speaking: Arc<AtomicBool>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the model's synthesized speech is being streamed.
    pub fn model_speaking(&self) -> bool {
        self.model_speaking.load(Ordering::SeqCst)
    }

    pub fn set_model_speaking(&self, speaking: bool) {
        self.model_speaking.store(speaking, Ordering::SeqCst);
    }
}
