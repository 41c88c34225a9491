//! Realtime protocol layer
//!
//! One persistent, ordered, bidirectional WebSocket connection to the
//! conversational model:
//! - `connect` opens the socket and sends the session configuration
//! - `RealtimeHandle` is the outbound surface (audio, vision context, shutdown)
//! - `EventRouter` dispatches inbound events strictly in arrival order

pub mod client;
pub mod dispatch;
pub mod events;

pub use client::{connect, ConnectOptions, ConnectionState, RealtimeHandle};
pub use dispatch::EventRouter;
pub use events::{ClientEvent, ResponseSpec, ServerEvent, SessionProfile};
