use std::time::Duration;
use thiserror::Error;

/// Failures of a single remote evaluation request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Remote transport is not connected")]
    NotConnected,

    #[error("Failed to send evaluation request: {0}")]
    Send(String),

    #[error("Transport channel closed while awaiting a result")]
    ChannelClosed,

    #[error("Node '{node_id}' reported no progress for {window:?}")]
    InactivityTimeout { node_id: String, window: Duration },

    #[error("Node '{node_id}' did not finish within {limit:?}")]
    AbsoluteTimeout { node_id: String, limit: Duration },

    #[error("Remote evaluation failed: {0}")]
    Remote(String),
}

impl RemoteError {
    /// Whether this failure came from one of the two timeout policies
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::InactivityTimeout { .. } | Self::AbsoluteTimeout { .. })
    }
}

/// Per-node failures; none of these abort a run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Node '{0}' is referenced but not present in the graph")]
    MissingNode(String),

    #[error("Node '{node_id}' has an unregistered type: '{node_type}'")]
    MissingTypeDefinition { node_id: String, node_type: String },

    #[error("No local computation registered for type '{0}'")]
    LocalEvaluatorGap(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
