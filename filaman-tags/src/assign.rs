//! Outbound payloads derived from catalog spools

use crate::catalog::{unquote, Spool};
use filaman_common::protocol::{
    AmsTray, SpoolAssignment, SpoolTagPayload, SpoolmanSettings, TagContents,
};

const DEFAULT_TEMP_MIN: i64 = 175;
const DEFAULT_TEMP_MAX: i64 = 275;
const DEFAULT_COLOR: &str = "FFFFFF";
const DEFAULT_CALI_IDX: &str = "-1";

fn extra(value: &Option<String>) -> Option<String> {
    value.as_deref().map(unquote).filter(|v| !v.is_empty())
}

impl Spool {
    /// Nozzle range from the filament, or 175/275 without a `[min, max]` pair
    pub fn nozzle_range(&self) -> (i64, i64) {
        match self.filament.nozzle_temperature.as_deref() {
            Some([min, max, ..]) => (*min, *max),
            _ => (DEFAULT_TEMP_MIN, DEFAULT_TEMP_MAX),
        }
    }

    fn color_or_default(&self) -> String {
        self.filament
            .color_hex
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLOR.to_string())
    }

    /// Assign this spool to a tray slot
    pub fn assignment(&self, ams_id: u32, tray_id: u32) -> SpoolAssignment {
        let (min, max) = self.nozzle_range();
        let extras = &self.filament.extra;
        SpoolAssignment {
            ams_id,
            tray_id,
            color: self.color_or_default(),
            nozzle_temp_min: min,
            nozzle_temp_max: max,
            material: self.filament.material.clone().unwrap_or_default(),
            brand: self.vendor_name().unwrap_or_default().to_string(),
            tray_info_idx: Some(extra(&extras.bambu_idx).unwrap_or_default()),
            cali_idx: Some(
                extra(&extras.bambu_cali_id).unwrap_or_else(|| DEFAULT_CALI_IDX.to_string()),
            ),
            bambu_setting_id: extra(&extras.bambu_setting_id),
        }
    }

    /// Contents for writing a spool tag
    pub fn tag_contents(&self) -> TagContents {
        let (min, max) = self.nozzle_range();
        TagContents::Spool(SpoolTagPayload {
            color_hex: self.color_or_default(),
            material: self.filament.material.clone().unwrap_or_default(),
            min_temp: min.to_string(),
            max_temp: max.to_string(),
            brand: self.vendor_name().unwrap_or_default().to_string(),
            sm_id: self.id.to_string(),
        })
    }

    /// Calibration identifiers from a tray, tied to this spool's filament
    pub fn settings_for_tray(&self, tray: &AmsTray) -> SpoolmanSettings {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let temp = |v: Option<i64>| v.map(|t| t.to_string()).unwrap_or_default();
        SpoolmanSettings {
            filament_id: self.filament.id,
            tray_info_idx: text(&tray.tray_info_idx),
            setting_id: text(&tray.setting_id),
            cali_idx: text(&tray.cali_idx),
            temp_min: temp(tray.nozzle_temp_min),
            temp_max: temp(tray.nozzle_temp_max),
        }
    }
}
