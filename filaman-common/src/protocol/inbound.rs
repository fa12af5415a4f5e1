//! Messages received from the device

use super::ams::AmsUnit;
use super::lenient;
use super::nfc::TagPresence;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Live AMS telemetry
    AmsData {
        #[serde(default)]
        payload: Vec<AmsUnit>,
    },

    /// Tag presence on the reader
    NfcTag {
        #[serde(default)]
        payload: NfcTagPayload,
    },

    /// Decoded tag contents, classified later by `NfcContent::from_value`
    NfcData {
        #[serde(default)]
        payload: Value,
    },

    /// Acknowledgment of a prior `writeNfcTag`
    WriteNfcTag {
        #[serde(default, deserialize_with = "lenient::flag")]
        success: bool,
    },

    /// Liveness ack carrying peer status
    Heartbeat(PeerStatus),

    /// Acknowledgment of a settings push
    SetSpoolmanSettings {
        #[serde(default)]
        payload: Value,
    },

    /// Any other `type`; ignored by the session
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse one text frame
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Frame name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::AmsData { .. } => "amsData",
            InboundMessage::NfcTag { .. } => "nfcTag",
            InboundMessage::NfcData { .. } => "nfcData",
            InboundMessage::WriteNfcTag { .. } => "writeNfcTag",
            InboundMessage::Heartbeat(_) => "heartbeat",
            InboundMessage::SetSpoolmanSettings { .. } => "setSpoolmanSettings",
            InboundMessage::Unknown => "unknown",
        }
    }
}

/// `nfcTag` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NfcTagPayload {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub found: Option<i64>,
}

impl NfcTagPayload {
    /// A missing `found` is treated as a read error
    pub fn presence(&self) -> TagPresence {
        TagPresence::from_found(self.found.unwrap_or(2))
    }
}

/// Peer status carried by an inbound heartbeat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    /// Free device memory in KiB
    #[serde(rename = "freeHeap", default, deserialize_with = "lenient::opt_i64")]
    pub free_heap_kb: Option<i64>,
    /// Device's printer connection
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub bambu_connected: Option<bool>,
    /// Device's catalog connection
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub spoolman_connected: Option<bool>,
}

/// `setSpoolmanSettings` ack succeeds only for the literal `"success"`
pub fn settings_ack_success(payload: &Value) -> bool {
    payload.as_str() == Some("success")
}
