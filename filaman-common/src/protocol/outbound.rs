//! Messages sent to the device

use super::ams::{EXTERNAL_AMS_ID, EXTERNAL_TRAY_ID};
use serde::{Deserialize, Serialize};

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Liveness probe
    Heartbeat,

    /// Ask the device to retry one of its own upstream connections
    Reconnect { payload: Subsystem },

    /// Assign a physical slot to a catalog spool
    SetBambuSpool { payload: SpoolAssignment },

    /// Encode the tag currently on the reader
    WriteNfcTag {
        #[serde(rename = "tagType")]
        tag_type: TagType,
        payload: TagContents,
    },

    /// Push calibration and setting identifiers tied to a catalog filament
    SetSpoolmanSettings { payload: SpoolmanSettings },
}

impl OutboundMessage {
    /// Write-tag request; the tag type follows from the contents
    pub fn write_tag(contents: TagContents) -> Self {
        OutboundMessage::WriteNfcTag {
            tag_type: contents.tag_type(),
            payload: contents,
        }
    }

    /// Frame name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Heartbeat => "heartbeat",
            OutboundMessage::Reconnect { .. } => "reconnect",
            OutboundMessage::SetBambuSpool { .. } => "setBambuSpool",
            OutboundMessage::WriteNfcTag { .. } => "writeNfcTag",
            OutboundMessage::SetSpoolmanSettings { .. } => "setSpoolmanSettings",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Device-side upstream connection that can be asked to reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// Printer (MQTT) connection
    Bambu,
    /// Inventory catalog connection
    Spoolman,
}

/// `setBambuSpool` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolAssignment {
    #[serde(rename = "amsId")]
    pub ams_id: u32,
    #[serde(rename = "trayId")]
    pub tray_id: u32,
    pub color: String,
    pub nozzle_temp_min: i64,
    pub nozzle_temp_max: i64,
    #[serde(rename = "type")]
    pub material: String,
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tray_info_idx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cali_idx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bambu_setting_id: Option<String>,
}

impl SpoolAssignment {
    /// Clear the external spool holder
    pub fn eject_external() -> Self {
        Self {
            ams_id: EXTERNAL_AMS_ID,
            tray_id: EXTERNAL_TRAY_ID,
            color: "FFFFFF".to_string(),
            nozzle_temp_min: 0,
            nozzle_temp_max: 0,
            material: String::new(),
            brand: String::new(),
            tray_info_idx: None,
            cali_idx: None,
            bambu_setting_id: None,
        }
    }
}

/// Kind of tag being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Spool,
    Location,
}

/// Spool tag payload; temperatures and the catalog id travel as strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolTagPayload {
    pub color_hex: String,
    #[serde(rename = "type")]
    pub material: String,
    pub min_temp: String,
    pub max_temp: String,
    pub brand: String,
    pub sm_id: String,
}

/// `writeNfcTag` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagContents {
    Spool(SpoolTagPayload),
    Location { location: String },
}

impl TagContents {
    pub fn location(location: impl Into<String>) -> Self {
        TagContents::Location {
            location: location.into(),
        }
    }

    pub fn tag_type(&self) -> TagType {
        match self {
            TagContents::Spool(_) => TagType::Spool,
            TagContents::Location { .. } => TagType::Location,
        }
    }
}

/// `setSpoolmanSettings` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolmanSettings {
    pub filament_id: i64,
    pub tray_info_idx: String,
    pub setting_id: String,
    pub cali_idx: String,
    pub temp_min: String,
    pub temp_max: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn as_value(msg: &OutboundMessage) -> Value {
        serde_json::from_str(&msg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_heartbeat_shape() {
        assert_eq!(as_value(&OutboundMessage::Heartbeat), json!({"type": "heartbeat"}));
    }

    #[test]
    fn test_reconnect_shape() {
        let msg = OutboundMessage::Reconnect {
            payload: Subsystem::Spoolman,
        };
        assert_eq!(
            as_value(&msg),
            json!({"type": "reconnect", "payload": "spoolman"})
        );
    }

    #[test]
    fn test_write_location_tag_shape() {
        let msg = OutboundMessage::write_tag(TagContents::location("Shelf B"));
        assert_eq!(
            as_value(&msg),
            json!({"type": "writeNfcTag", "tagType": "location", "payload": {"location": "Shelf B"}})
        );
    }

    #[test]
    fn test_eject_external_shape() {
        let msg = OutboundMessage::SetBambuSpool {
            payload: SpoolAssignment::eject_external(),
        };
        assert_eq!(
            as_value(&msg),
            json!({
                "type": "setBambuSpool",
                "payload": {
                    "amsId": 255,
                    "trayId": 254,
                    "color": "FFFFFF",
                    "nozzle_temp_min": 0,
                    "nozzle_temp_max": 0,
                    "type": "",
                    "brand": ""
                }
            })
        );
    }

    #[test]
    fn test_assignment_omits_absent_extras() {
        let msg = OutboundMessage::SetBambuSpool {
            payload: SpoolAssignment {
                ams_id: 0,
                tray_id: 3,
                color: "FF0000".to_string(),
                nozzle_temp_min: 190,
                nozzle_temp_max: 220,
                material: "PLA".to_string(),
                brand: "Generic".to_string(),
                tray_info_idx: Some("GFL99".to_string()),
                cali_idx: Some("-1".to_string()),
                bambu_setting_id: None,
            },
        };
        let value = as_value(&msg);
        assert_eq!(value["type"], "setBambuSpool");
        assert_eq!(value["payload"]["amsId"], 0);
        assert_eq!(value["payload"]["trayId"], 3);
        assert_eq!(value["payload"]["type"], "PLA");
        assert!(value["payload"].get("bambu_setting_id").is_none());
    }
}
