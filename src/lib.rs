pub mod audio;
pub mod config;
pub mod conversation;
pub mod protocol;
pub mod session;
pub mod vision;

pub use audio::{
    AudioFrame, CaptureBackend, CaptureLoop, CaptureSink, PlaybackBackend, PlaybackSink,
    WavFileCapture, WavFilePlayback,
};
pub use config::Config;
pub use conversation::{ConversationLog, ConversationMessage, ConversationUpdate, Role};
pub use protocol::{ConnectOptions, ConnectionState, RealtimeHandle};
pub use session::{
    SessionCollaborators, SessionConfig, SessionController, SessionFault, SessionStats, TurnState,
};
pub use vision::{
    CameraBackend, ContextSink, StillImageCamera, VisionAugmenter, VisionClient, VisionDescriber,
    VisionOptions,
};
