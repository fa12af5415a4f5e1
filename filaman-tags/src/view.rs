//! Tray view enrichment
//!
//! Combines an AMS tray with the catalog spool its tag correlates to. Catalog
//! data wins where present; tray data fills the gaps.

use crate::catalog::Spool;
use crate::correlate::{correlate_with_rule, MatchRule, TagReading};
use filaman_common::protocol::ams::content;
use filaman_common::protocol::{AmsTray, AmsUnit, EXTERNAL_AMS_ID};
use serde::Serialize;
use std::fmt;

const DEFAULT_COLOR: &str = "FFFFFF";

/// Remaining filament on a tray
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Remaining {
    /// From the catalog
    Grams(f64),
    /// From the AMS estimate
    Percent(i64),
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Grams(g) => write!(f, "{}g", g.round()),
            Remaining::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// Display model for one tray
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrayView {
    pub ams_id: u32,
    pub tray_id: u32,
    pub display_name: String,
    pub is_empty: bool,
    pub spool_id: Option<i64>,
    pub match_rule: Option<MatchRule>,
    pub color_hex: String,
    pub vendor: Option<String>,
    pub filament_name: Option<String>,
    pub material: Option<String>,
    pub remaining: Option<Remaining>,
    pub can_push_settings: bool,
}

impl TrayView {
    pub fn build(unit: &AmsUnit, tray: &AmsTray, spools: &[Spool]) -> Self {
        let reading = TagReading::from_tray(tray);
        let matched = correlate_with_rule(&reading, spools);
        let spool = matched.map(|(spool, _)| spool);

        let display_name = if unit.ams_id == EXTERNAL_AMS_ID {
            "External".to_string()
        } else {
            format!("Tray {}", tray.id)
        };

        let color_hex = spool
            .and_then(|s| s.filament.color_hex.as_deref())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| content(&tray.tray_color).map(|c| c.chars().take(6).collect()))
            .unwrap_or_else(|| DEFAULT_COLOR.to_string());

        let vendor = spool
            .and_then(Spool::vendor_name)
            .or_else(|| content(&tray.tray_sub_brands))
            .map(str::to_string);

        let material = spool
            .and_then(|s| s.filament.material.as_deref())
            .filter(|m| !m.is_empty())
            .or_else(|| content(&tray.tray_type))
            .map(str::to_string);

        let remaining = spool
            .and_then(|s| s.remaining_weight)
            .map(Remaining::Grams)
            .or_else(|| tray.remain.filter(|r| *r > 0).map(Remaining::Percent));

        Self {
            ams_id: unit.ams_id,
            tray_id: tray.id,
            display_name,
            is_empty: tray.is_empty(),
            spool_id: spool.map(|s| s.id),
            match_rule: matched.map(|(_, rule)| rule),
            color_hex,
            vendor,
            filament_name: spool.and_then(|s| s.filament.name.clone()),
            material,
            remaining,
            can_push_settings: tray.has_setting(),
        }
    }

    /// Views for every tray of every unit, in order
    pub fn build_all(units: &[AmsUnit], spools: &[Spool]) -> Vec<Self> {
        units
            .iter()
            .flat_map(|unit| unit.tray.iter().map(move |tray| Self::build(unit, tray, spools)))
            .collect()
    }
}
