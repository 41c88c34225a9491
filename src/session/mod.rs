//! Session lifecycle
//!
//! This module provides the `SessionController` composition root that
//! manages:
//! - The realtime connection (opened first, closed gracefully on stop)
//! - Audio capture forwarding and speech playback
//! - Periodic vision augmentation
//! - Turn-taking state shared between capture and inbound dispatch
//! - Fault reporting and session statistics

mod config;
mod controller;
mod stats;
mod turn;

pub use config::SessionConfig;
pub use controller::{SessionCollaborators, SessionController};
pub use stats::SessionStats;
pub use turn::TurnState;

/// A component failure surfaced to the session owner.
///
/// Connection and device faults are session-fatal by policy; the
/// controller does not retry internally. Vision cycle failures never
/// appear here — they are recovered at cycle granularity.
#[derive(Debug, Clone)]
pub enum SessionFault {
    /// The realtime connection failed or was closed by the server.
    Connection(String),
    /// The capture device stopped delivering frames.
    Capture(String),
    /// The playback device could not be opened or written.
    Playback(String),
}

impl std::fmt::Display for SessionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(reason) => write!(f, "connection fault: {reason}"),
            Self::Capture(reason) => write!(f, "capture fault: {reason}"),
            Self::Playback(reason) => write!(f, "playback fault: {reason}"),
        }
    }
}
