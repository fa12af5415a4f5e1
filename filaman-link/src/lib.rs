//! # FilaMan Link
//!
//! Keeps a single logical session with the device alive over an unreliable
//! link:
//! - liveness probing, with teardown when the peer goes silent
//! - fixed-interval reconnect, at most one pending at a time
//! - polling fallback over HTTP while the live session is down
//!
//! Inbound payloads are published as `LinkEvent`s on the `EventBus`.

pub mod error;
pub mod poll;
pub mod session;
pub mod transport;

pub use error::{LinkError, PollError, Result, TransportError};
pub use poll::{AmsSource, HttpAmsSource};
pub use session::{LinkHandle, SessionManager};
pub use transport::{Connector, Transport, WsConnector};
