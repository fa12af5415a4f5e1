//! NFC tag presence and decoded tag contents

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag presence reported by the reader (`nfcTag.payload.found`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagPresence {
    /// No tag on the reader (`0`)
    Absent,
    /// Tag present and read successfully (`1`)
    Read,
    /// Tag present but the read failed (any other value)
    Error,
}

impl TagPresence {
    pub fn from_found(found: i64) -> Self {
        match found {
            0 => TagPresence::Absent,
            1 => TagPresence::Read,
            _ => TagPresence::Error,
        }
    }
}

/// Spool tag contents as written by the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolTagData {
    /// Catalog spool id the tag refers to
    pub sm_id: String,
    pub brand: Option<String>,
    pub material: Option<String>,
    pub color_hex: Option<String>,
    pub min_temp: Option<String>,
    pub max_temp: Option<String>,
}

impl SpoolTagData {
    /// Catalog spool id as a number, when it parses
    pub fn spool_id(&self) -> Option<i64> {
        self.sm_id.trim().parse().ok()
    }
}

/// Decoded `nfcData` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NfcContent {
    /// `{}`: reader cleared
    Empty,
    /// `{error: ..}`
    Error(String),
    /// `{info: ..}`
    Info(String),
    /// Spool tag with a catalog id
    Spool(SpoolTagData),
    /// Storage location tag
    Location(String),
    /// Anything else, kept verbatim
    Unknown(Value),
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.is_empty() || s == "null" => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl NfcContent {
    /// Classify a raw `nfcData` payload
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return NfcContent::Unknown(value.clone());
        };
        if obj.is_empty() {
            return NfcContent::Empty;
        }
        if let Some(error) = obj.get("error") {
            return NfcContent::Error(text(Some(error)).unwrap_or_default());
        }
        if let Some(info) = obj.get("info") {
            return NfcContent::Info(text(Some(info)).unwrap_or_default());
        }
        if let Some(sm_id) = text(obj.get("sm_id")).filter(|id| id != "0") {
            return NfcContent::Spool(SpoolTagData {
                sm_id,
                brand: text(obj.get("brand")),
                material: text(obj.get("type")),
                color_hex: text(obj.get("color_hex")),
                min_temp: text(obj.get("min_temp")),
                max_temp: text(obj.get("max_temp")),
            });
        }
        if let Some(location) = text(obj.get("location")) {
            return NfcContent::Location(location);
        }
        NfcContent::Unknown(value.clone())
    }
}
