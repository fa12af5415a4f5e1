//! AMS units and trays as reported by the device

use super::lenient;
use serde::{Deserialize, Serialize};

/// AMS id the device uses for the external spool holder
pub const EXTERNAL_AMS_ID: u32 = 255;

/// Tray id addressing the external spool holder in outbound commands
pub const EXTERNAL_TRAY_ID: u32 = 254;

/// One AMS unit (or the external holder) with its trays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmsUnit {
    pub ams_id: u32,
    #[serde(default)]
    pub tray: Vec<AmsTray>,
}

impl AmsUnit {
    /// True for the external spool holder
    pub fn is_external(&self) -> bool {
        self.ams_id == EXTERNAL_AMS_ID
    }
}

/// One tray slot
///
/// String fields may be missing, empty or the literal `"null"` on the wire;
/// all of those deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmsTray {
    pub id: u32,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tray_info_idx: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tray_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tray_sub_brands: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tray_color: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub nozzle_temp_min: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub nozzle_temp_max: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub setting_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub cali_idx: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub remain: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tray_uuid: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub tag_uid: Option<String>,
}

/// Returns the field's content when it is non-empty
pub fn content(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl AmsTray {
    /// A tray is empty when none of its identifying fields carries content
    pub fn is_empty(&self) -> bool {
        [
            &self.tray_type,
            &self.tray_sub_brands,
            &self.tray_info_idx,
            &self.setting_id,
            &self.cali_idx,
        ]
        .into_iter()
        .all(|f| content(f).is_none())
    }

    /// Whether calibration settings for this tray can be pushed to the catalog
    pub fn has_setting(&self) -> bool {
        content(&self.setting_id).is_some()
    }
}
