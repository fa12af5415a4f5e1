//! Wire protocol spoken with the device
//!
//! Every frame on the live session is a JSON object tagged by a `type` field.
//! The device firmware is loose about value types (integers where booleans are
//! meant, numbers where strings are meant, the literal `"null"` for missing
//! strings), so the shapes here deserialize leniently.

pub mod ams;
pub mod inbound;
pub mod nfc;
pub mod outbound;

pub use ams::{AmsTray, AmsUnit, EXTERNAL_AMS_ID, EXTERNAL_TRAY_ID};
pub use inbound::{settings_ack_success, InboundMessage, NfcTagPayload, PeerStatus};
pub use nfc::{NfcContent, SpoolTagData, TagPresence};
pub use outbound::{
    OutboundMessage, SpoolAssignment, SpoolTagPayload, SpoolmanSettings, Subsystem, TagContents,
    TagType,
};

/// Lenient deserializers for firmware-produced values
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// String-ish value: strings pass through, numbers and bools are rendered,
    /// null and the literal `"null"` become `None`
    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) if s == "null" => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Integer-ish value: numbers pass through, numeric strings are parsed,
    /// anything else becomes `None`
    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Boolean-ish value: `true`/`false`, `0`/non-zero, `"true"`/`"1"`
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
            _ => false,
        })
    }

    /// Optional boolean-ish value
    pub fn opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0),
            Some(Value::String(s)) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }
}
