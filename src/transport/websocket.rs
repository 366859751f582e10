/// WebSocket client channel
///
/// Connects to the backend's `/ws` endpoint. One writer task drains an mpsc
/// queue into the socket sink; one reader task decodes text or binary JSON
/// frames and broadcasts them to subscribers. When the socket drops, the
/// channel reports itself closed and further sends fail immediately.

use crate::transport::{closed_notice, Channel, TransportError, INBOUND_CAPACITY};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Duplex JSON channel over a WebSocket connection
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: broadcast::Sender<Value>,
    open: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Open a connection and spawn the reader/writer tasks
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = connect_async(url).await.map_err(|e| TransportError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        tracing::info!("🔌 Connected to backend channel at {}", url);

        let (mut sink, mut source) = ws.split();
        let (outbound, mut rx_out) = mpsc::unbounded_channel::<Message>();
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));

        // Writer: queue -> socket
        let writer_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(message) = rx_out.recv().await {
                if let Err(e) = sink.send(message).await {
                    tracing::error!("❌ WebSocket send failed: {}", e);
                    break;
                }
            }
            writer_open.store(false, Ordering::SeqCst);
        });

        // Reader: socket -> subscribers
        let reader_open = Arc::clone(&open);
        let reader_inbound = inbound.clone();
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let decoded = match frame {
                    Ok(Message::Text(text)) => serde_json::from_str::<Value>(text.as_str()),
                    Ok(Message::Binary(bytes)) => serde_json::from_slice::<Value>(&bytes),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!("❌ WebSocket error: {}", e);
                        break;
                    }
                };

                match decoded {
                    // No subscribers simply means no request is waiting
                    Ok(message) => {
                        let _ = reader_inbound.send(message);
                    }
                    Err(e) => tracing::warn!("⚠️ Ignoring non-JSON frame: {}", e),
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            let _ = reader_inbound.send(closed_notice());
            tracing::warn!("❌ Backend channel closed");
        });

        Ok(Self { outbound, inbound, open })
    }
}

impl Channel for WebSocketChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, message: Value) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let text = serde_json::to_string(&message).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.inbound.subscribe()
    }
}
