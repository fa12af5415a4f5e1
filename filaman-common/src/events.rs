//! Event types for the device link
//!
//! Provides `LinkEvent` and the `EventBus` that distributes it to every
//! interested consumer (view layer, monitor binary, tests).

use crate::protocol::{AmsUnit, NfcContent, PeerStatus, TagPresence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Logical session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Open => "Open",
            SessionState::Closing => "Closing",
        };
        f.write_str(name)
    }
}

/// Why a session ended (or never opened)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum DisconnectReason {
    /// Handshake failed or timed out
    TransportUnavailable(String),
    /// Transport closed or errored after being open
    TransportLost(String),
    /// No inbound traffic within the liveness timeout
    LivenessTimeout,
    /// The manager is stopping
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::TransportUnavailable(detail) => {
                write!(f, "transport unavailable: {}", detail)
            }
            DisconnectReason::TransportLost(detail) => write!(f, "transport lost: {}", detail),
            DisconnectReason::LivenessTimeout => f.write_str("liveness timeout"),
            DisconnectReason::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Events published by the session manager
///
/// Live and polled AMS telemetry arrive through the same `AmsData` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LinkEvent {
    /// Session state transition
    StateChanged {
        from: SessionState,
        to: SessionState,
        timestamp: DateTime<Utc>,
    },

    /// Derived online/offline status
    ConnectionChanged {
        connected: bool,
        timestamp: DateTime<Utc>,
    },

    /// Session ended or failed to open
    Disconnected {
        reason: DisconnectReason,
        timestamp: DateTime<Utc>,
    },

    /// A reconnect attempt is pending
    ReconnectScheduled {
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// AMS units, from the live session or the polling fallback
    AmsData {
        units: Vec<AmsUnit>,
        timestamp: DateTime<Utc>,
    },

    /// Tag presence on the reader
    NfcTag {
        presence: TagPresence,
        timestamp: DateTime<Utc>,
    },

    /// Decoded tag contents
    NfcData {
        content: NfcContent,
        timestamp: DateTime<Utc>,
    },

    /// Result of a tag write
    WriteNfcTagResult {
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// Device-side connection flags and memory
    PeerStatus {
        status: PeerStatus,
        timestamp: DateTime<Utc>,
    },

    /// Result of a settings push
    SpoolmanSettingsResult {
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

impl LinkEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LinkEvent::StateChanged { timestamp, .. }
            | LinkEvent::ConnectionChanged { timestamp, .. }
            | LinkEvent::Disconnected { timestamp, .. }
            | LinkEvent::ReconnectScheduled { timestamp, .. }
            | LinkEvent::AmsData { timestamp, .. }
            | LinkEvent::NfcTag { timestamp, .. }
            | LinkEvent::NfcData { timestamp, .. }
            | LinkEvent::WriteNfcTagResult { timestamp, .. }
            | LinkEvent::PeerStatus { timestamp, .. }
            | LinkEvent::SpoolmanSettingsResult { timestamp, .. } => *timestamp,
        }
    }
}

/// Broadcast bus for `LinkEvent`
///
/// Slow subscribers lose the oldest events (`RecvError::Lagged`) rather than
/// blocking the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LinkEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use filaman_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LinkEvent,
    ) -> Result<usize, broadcast::error::SendError<LinkEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LinkEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
