//! Wire events for the realtime connection
//!
//! Every message on the WebSocket is a JSON object with a `type` field.
//! Outbound events are built from typed structs; inbound events parse into
//! `ServerEvent`, with every type this client does not consume collapsing
//! into `Unrecognized`.

use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

/// Outbound message sent by this client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Session configuration; sent exactly once, right after the
    /// connection opens.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionProfile },

    /// One chunk of captured audio, transport-encoded.
    #[serde(rename = "input_audio_buffer.append")]
    AppendAudio { audio: String },

    /// End-of-utterance marker, emitted after the server confirms the
    /// input transcription.
    #[serde(rename = "input_audio_buffer.commit")]
    CommitAudio,

    /// Ask the model to respond with the given contextual instructions.
    #[serde(rename = "response.create")]
    CreateResponse { response: ResponseSpec },
}

/// The `session` object carried by `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionProfile {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: TranscriptionProfile,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionProfile {
    pub enabled: bool,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// The `response` object carried by `response.create`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSpec {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub output_audio_format: String,
}

impl SessionProfile {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            modalities: config.modalities.clone(),
            instructions: config.instructions.clone(),
            voice: config.voice.clone(),
            input_audio_format: config.input_audio_format.clone(),
            output_audio_format: config.output_audio_format.clone(),
            input_audio_transcription: TranscriptionProfile {
                enabled: true,
                model: config.transcription_model.clone(),
            },
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: config.vad_threshold,
                prefix_padding_ms: config.vad_prefix_padding_ms,
                silence_duration_ms: config.vad_silence_duration_ms,
            },
        }
    }
}

impl ResponseSpec {
    /// A response request carrying a vision description as context.
    pub fn vision_context(config: &SessionConfig, description: &str) -> Self {
        Self {
            modalities: config.modalities.clone(),
            instructions: format!(
                "Context for conversation: Here is what I see in the image - {description}. \
                 Please assist the user accordingly."
            ),
            voice: config.voice.clone(),
            output_audio_format: config.output_audio_format.clone(),
        }
    }
}

/// Inbound message from the conversational service.
///
/// Consumed once by the dispatcher, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A conversation item appeared server-side; an assistant item opens a
    /// new transcript message.
    #[serde(rename = "conversation.item.created")]
    ItemCreated { item: CreatedItem },

    /// Server-side transcription of the user's utterance finished.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    /// Incremental fragment of the assistant's text response.
    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },

    /// Incremental fragment of synthesized speech, transport-encoded.
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// The assistant's speech for this response has finished.
    #[serde(rename = "response.audio.done")]
    AudioDone {},

    /// Any event type this client does not consume.
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedItem {
    #[serde(default)]
    pub role: Option<String>,
}

impl CreatedItem {
    pub fn is_assistant(&self) -> bool {
        self.role.as_deref() == Some("assistant")
    }
}
