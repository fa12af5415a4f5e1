//! Session manager
//!
//! One tokio task owns the session, its transport and every timer; callers
//! talk to it through a cloneable `LinkHandle` and observe it through the
//! `EventBus` and a `watch` channel carrying the current `SessionState`.

mod actor;
pub mod state;
pub mod timers;

pub use actor::SessionManager;

use crate::error::{LinkError, Result};
use filaman_common::protocol::{OutboundMessage, Subsystem};
use filaman_common::{EventBus, LinkEvent, SessionState};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Requests accepted by the session manager task
#[derive(Debug)]
pub(crate) enum LinkCommand {
    Connect,
    Send {
        message: OutboundMessage,
        reply: oneshot::Sender<Result<()>>,
    },
    PollNow,
}

/// Handle to a running session manager
///
/// The manager stops when `shutdown` is called or when the last handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    commands: mpsc::Sender<LinkCommand>,
    state: watch::Receiver<SessionState>,
    bus: EventBus,
    shutdown: CancellationToken,
}

impl LinkHandle {
    /// Start a connection attempt if the session is down and none is pending
    pub async fn connect(&self) -> Result<()> {
        self.commands
            .send(LinkCommand::Connect)
            .await
            .map_err(|_| LinkError::Shutdown)
    }

    /// Send a message over the open session
    ///
    /// Fails with `NotConnected` unless the session is open.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(LinkCommand::Send { message, reply })
            .await
            .map_err(|_| LinkError::Shutdown)?;
        response.await.map_err(|_| LinkError::Shutdown)?
    }

    /// Ask the device to retry one of its upstream connections
    pub async fn request_peer_reconnect(&self, subsystem: Subsystem) -> Result<()> {
        self.send(OutboundMessage::Reconnect { payload: subsystem })
            .await
    }

    /// Run the polling fallback now (still a no-op while open)
    pub async fn poll_now(&self) -> Result<()> {
        self.commands
            .send(LinkCommand::PollNow)
            .await
            .map_err(|_| LinkError::Shutdown)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.bus.subscribe()
    }

    /// Stop the manager and wait until it has released the transport
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.commands.closed().await;
    }
}
