/// Transport Layer
///
/// The remote executor talks to the backend over a duplex channel of JSON
/// messages. Only the message contract matters to the engine:
/// - `send` queues one outbound JSON message
/// - `subscribe` returns a receiver of every inbound message from that point on
/// - `is_open` reports whether the channel can currently carry requests
///
/// Inbound delivery is unordered with respect to requests; the remote
/// executor correlates responses itself.

// In-process duplex channel (tests and embedding)
pub mod memory;

// WebSocket client channel using tokio-tungstenite
pub mod websocket;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::{MemoryChannel, MemoryPeer};
pub use websocket::WebSocketChannel;

/// Buffered inbound messages per subscriber before it starts lagging
pub const INBOUND_CAPACITY: usize = 1024;

/// Message type published to subscribers when a channel shuts down
pub const CLOSED_NOTICE: &str = "transport-closed";

/// Inbound notice telling waiting requests the channel is gone
pub fn closed_notice() -> Value {
    serde_json::json!({ "type": CLOSED_NOTICE })
}

/// Errors raised by channel implementations
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Channel is closed")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Duplex JSON message channel
pub trait Channel: Send + Sync {
    /// Whether requests can currently be sent
    fn is_open(&self) -> bool;

    /// Queue one outbound message
    fn send(&self, message: Value) -> Result<(), TransportError>;

    /// Receive every inbound message published after this call
    fn subscribe(&self) -> broadcast::Receiver<Value>;
}
