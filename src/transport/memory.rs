/// In-process duplex channel
///
/// `MemoryChannel` is the engine side; `MemoryPeer` plays the backend, reading
/// requests and emitting events. Useful for tests and for embedding a backend
/// in the same process.

use crate::transport::{closed_notice, Channel, TransportError, INBOUND_CAPACITY};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{broadcast, mpsc};

/// Engine-side end of an in-process channel
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    requests: mpsc::UnboundedSender<Value>,
    events: broadcast::Sender<Value>,
    open: Arc<AtomicBool>,
}

/// Backend-side end of an in-process channel
#[derive(Debug)]
pub struct MemoryPeer {
    requests: mpsc::UnboundedReceiver<Value>,
    events: broadcast::Sender<Value>,
    open: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Create a connected channel/peer pair
    pub fn pair() -> (MemoryChannel, MemoryPeer) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(INBOUND_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));

        let channel = MemoryChannel {
            requests: requests_tx,
            events: events.clone(),
            open: Arc::clone(&open),
        };
        let peer = MemoryPeer {
            requests: requests_rx,
            events,
            open,
        };
        (channel, peer)
    }
}

impl Channel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, message: Value) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.requests.send(message).map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.events.subscribe()
    }
}

impl MemoryPeer {
    /// Wait for the next request sent by the engine
    pub async fn next_request(&mut self) -> Option<Value> {
        self.requests.recv().await
    }

    /// Publish an inbound message to every current subscriber
    ///
    /// Returns false when nobody is listening.
    pub fn emit(&self, message: Value) -> bool {
        self.events.send(message).is_ok()
    }

    /// Mark the channel as closed and wake any waiting request
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(closed_notice());
    }
}
