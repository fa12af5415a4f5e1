//! Inventory catalog (Spoolman) snapshot and client
//!
//! The catalog is read-only from this crate's point of view: spools and
//! locations are fetched as a snapshot that correlation and view building
//! work against.

use crate::correlate::TaggedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("filaman-tags/", env!("CARGO_PKG_VERSION"));

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Catalog or device returned an error response
    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Failed to parse a response body
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No catalog URL configured and the device did not provide one
    #[error("Catalog URL unavailable: {0}")]
    UrlUnavailable(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Filament vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Filament extras; values are JSON-encoded strings in Spoolman
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilamentExtra {
    pub bambu_idx: Option<String>,
    pub bambu_cali_id: Option<String>,
    pub bambu_setting_id: Option<String>,
}

/// Filament definition a spool belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filament {
    #[serde(default)]
    pub id: i64,
    pub name: Option<String>,
    pub material: Option<String>,
    pub color_hex: Option<String>,
    pub multi_color_hexes: Option<String>,
    pub vendor: Option<Vendor>,
    /// Some catalogs carry a `[min, max]` nozzle range
    pub nozzle_temperature: Option<Vec<i64>>,
    #[serde(default)]
    pub extra: FilamentExtra,
}

/// Spool extras holding the stored tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoolExtra {
    pub tag: Option<String>,
    /// Legacy field written by older firmware
    pub nfc_id: Option<String>,
}

/// One catalog spool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spool {
    pub id: i64,
    pub remaining_weight: Option<f64>,
    pub remaining_length: Option<f64>,
    pub location: Option<String>,
    #[serde(default)]
    pub filament: Filament,
    #[serde(default)]
    pub extra: SpoolExtra,
}

/// Strip JSON quoting and escapes from an extras value
pub fn unquote(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string()
}

fn has_content(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !unquote(v).is_empty()).unwrap_or(false)
}

impl Spool {
    /// Whether the spool carries a tag in `extra.tag` or the legacy `extra.nfc_id`
    pub fn has_valid_tag(&self) -> bool {
        has_content(&self.extra.tag) || has_content(&self.extra.nfc_id)
    }

    pub fn vendor_name(&self) -> Option<&str> {
        self.filament
            .vendor
            .as_ref()
            .map(|v| v.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// `"<id> | <name> (<material>)"`, the label the device UI uses
    pub fn label(&self) -> String {
        format!(
            "{} | {} ({})",
            self.id,
            self.filament.name.as_deref().unwrap_or(""),
            self.filament.material.as_deref().unwrap_or("")
        )
    }
}

impl TaggedRecord for Spool {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn stored_tag(&self) -> Option<&str> {
        if has_content(&self.extra.tag) {
            self.extra.tag.as_deref()
        } else {
            self.extra.nfc_id.as_deref()
        }
    }
}

/// Aggregate figures over a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub total_spools: usize,
    pub spools_without_tag: usize,
    pub vendor_count: usize,
    /// Grams
    pub total_weight: f64,
    /// Millimetres
    pub total_length: f64,
    /// Spool count per upper-cased material
    pub materials: BTreeMap<String, usize>,
}

/// Ordered catalog contents at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    pub spools: Vec<Spool>,
    pub locations: Vec<String>,
}

impl CatalogSnapshot {
    pub fn new(spools: Vec<Spool>, locations: Vec<String>) -> Self {
        Self { spools, locations }
    }

    pub fn spool(&self, id: i64) -> Option<&Spool> {
        self.spools.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.spools.is_empty()
    }

    /// Spools without a vendor are left out of every figure
    pub fn summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary::default();
        let mut vendors = HashSet::new();

        for spool in &self.spools {
            let Some(vendor) = &spool.filament.vendor else {
                continue;
            };
            summary.total_spools += 1;
            vendors.insert(vendor.id);

            if let Some(material) = spool.filament.material.as_deref().filter(|m| !m.is_empty()) {
                *summary.materials.entry(material.to_uppercase()).or_insert(0) += 1;
            }
            summary.total_weight += spool.remaining_weight.unwrap_or(0.0);
            summary.total_length += spool.remaining_length.unwrap_or(0.0);
            if !spool.has_valid_tag() {
                summary.spools_without_tag += 1;
            }
        }

        summary.vendor_count = vendors.len();
        summary
    }
}

/// Source of catalog snapshots
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn snapshot(&self) -> Result<CatalogSnapshot>;
}

#[derive(Debug, Deserialize)]
struct UrlResponse {
    spoolman_url: Option<String>,
}

/// Spoolman REST client
///
/// The catalog URL is either configured or discovered through the device's
/// `/api/url` endpoint on every snapshot.
pub struct SpoolmanClient {
    http_client: reqwest::Client,
    base_url: Option<String>,
    discovery_url: Option<String>,
}

impl SpoolmanClient {
    fn build_http(timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))
    }

    /// Client for a known catalog URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_http(timeout)?,
            base_url: Some(base_url.into()),
            discovery_url: None,
        })
    }

    /// Client that asks the device for the catalog URL
    pub fn discovered(discovery_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_http(timeout)?,
            base_url: None,
            discovery_url: Some(discovery_url.into()),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url = %url, "Querying catalog");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))
    }

    /// Resolve the catalog base URL, without a trailing slash
    pub async fn base_url(&self) -> Result<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        let discovery = self
            .discovery_url
            .as_deref()
            .ok_or_else(|| CatalogError::UrlUnavailable("no discovery endpoint".to_string()))?;

        let response: UrlResponse = self.get_json(discovery).await?;
        match response.spoolman_url.filter(|u| !u.is_empty()) {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Err(CatalogError::UrlUnavailable(
                "device returned no spoolman_url".to_string(),
            )),
        }
    }

    pub async fn fetch_spools(&self, base: &str) -> Result<Vec<Spool>> {
        self.get_json(&format!("{}/api/v1/spool", base)).await
    }

    pub async fn fetch_locations(&self, base: &str) -> Result<Vec<String>> {
        self.get_json(&format!("{}/api/v1/location", base)).await
    }
}

#[async_trait]
impl CatalogSource for SpoolmanClient {
    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let base = self.base_url().await?;
        let spools = self.fetch_spools(&base).await?;

        // locations are optional in older catalog versions
        let locations = match self.fetch_locations(&base).await {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!(error = %e, "Location list unavailable, continuing without it");
                Vec::new()
            }
        };

        tracing::info!(
            spools = spools.len(),
            locations = locations.len(),
            "Catalog snapshot fetched"
        );
        Ok(CatalogSnapshot::new(spools, locations))
    }
}
