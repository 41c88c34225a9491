use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a conversational session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether the session is currently active
    pub is_active: bool,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio frames forwarded to the service
    pub frames_sent: usize,

    /// Number of vision descriptions injected into the conversation
    pub vision_descriptions: usize,

    /// Number of messages in the transcript
    pub transcript_messages: usize,
}
