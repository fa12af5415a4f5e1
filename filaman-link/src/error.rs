//! Error types for the device link

use thiserror::Error;

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors surfaced to callers of the session manager
#[derive(Error, Debug)]
pub enum LinkError {
    /// Handshake failed or timed out
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Transport closed or errored after being open
    #[error("Transport lost: {0}")]
    TransportLost(String),

    /// No inbound traffic within the liveness timeout
    #[error("Liveness timeout")]
    LivenessTimeout,

    /// Send requested while the session is not open
    #[error("Not connected")]
    NotConnected,

    /// Inbound frame failed to parse
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Outbound message could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The session manager has stopped
    #[error("Session manager stopped")]
    Shutdown,
}

/// Errors reported by a transport implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out")]
    Timeout,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

/// Errors from the polling endpoint
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<filaman_common::DisconnectReason> for LinkError {
    fn from(reason: filaman_common::DisconnectReason) -> Self {
        use filaman_common::DisconnectReason;
        match reason {
            DisconnectReason::TransportUnavailable(detail) => LinkError::TransportUnavailable(detail),
            DisconnectReason::TransportLost(detail) => LinkError::TransportLost(detail),
            DisconnectReason::LivenessTimeout => LinkError::LivenessTimeout,
            DisconnectReason::Shutdown => LinkError::Shutdown,
        }
    }
}
