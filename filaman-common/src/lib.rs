//! # FilaMan Common Library
//!
//! Shared code for the FilaMan device client crates:
//! - Error type and configuration loading
//! - Wire protocol spoken with the device (AMS telemetry, NFC reads, commands)
//! - Event types (LinkEvent) and the EventBus that distributes them

pub mod config;
pub mod error;
pub mod events;
pub mod protocol;

pub use error::{Error, Result};
pub use events::{DisconnectReason, EventBus, LinkEvent, SessionState};
