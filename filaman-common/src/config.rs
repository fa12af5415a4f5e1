//! Configuration loading and config file resolution
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`FILAMAN_CONFIG`)
//! 3. Per-user TOML config file (`<config_dir>/filaman/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file never prevents startup: a warning is logged and the
//! compiled defaults are used.

use crate::{Error, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FILAMAN_CONFIG";

/// Environment variable overriding the device base URL
pub const DEVICE_URL_ENV_VAR: &str = "FILAMAN_DEVICE_URL";

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the device web server (e.g. `http://filaman.local`)
    pub device_url: String,

    /// Session, liveness, reconnect and polling timings
    pub link: LinkSettings,

    /// Inventory catalog access
    pub catalog: CatalogSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_url: "http://filaman.local".to_string(),
            link: LinkSettings::default(),
            catalog: CatalogSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Session manager timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Fixed delay before a reconnect attempt
    pub reconnect_interval_ms: u64,
    /// Interval between liveness probes while the session is open
    pub probe_interval_ms: u64,
    /// Maximum silence before the session is declared dead
    pub liveness_timeout_ms: u64,
    /// Interval of the polling fallback
    pub poll_interval_ms: u64,
    /// Upper bound on a transport handshake
    pub connect_timeout_ms: u64,
    /// Whether the polling fallback runs at all
    pub poll_enabled: bool,
    /// EventBus buffer size
    pub event_capacity: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 5_000,
            probe_interval_ms: 10_000,
            liveness_timeout_ms: 20_000,
            poll_interval_ms: 2_000,
            connect_timeout_ms: 10_000,
            poll_enabled: true,
            event_capacity: 256,
        }
    }
}

impl LinkSettings {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        let intervals = [
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("probe_interval_ms", self.probe_interval_ms),
            ("liveness_timeout_ms", self.liveness_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("link.{} must be greater than 0", name)));
            }
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "link.event_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inventory catalog (Spoolman) access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Catalog base URL; when absent the device is asked through `/api/url`
    pub spoolman_url: Option<String>,
    /// How often the catalog snapshot is refetched
    pub refresh_interval_ms: u64,
    /// Timeout for a single catalog request
    pub request_timeout_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            spoolman_url: None,
            refresh_interval_ms: 60_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl CatalogSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// URLs derived from the device base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoints {
    /// Live session endpoint (`ws://host/ws` or `wss://host/ws`)
    pub websocket: Url,
    /// Polling fallback endpoint (`/api/ams`)
    pub ams: Url,
    /// Catalog discovery endpoint (`/api/url`)
    pub catalog_discovery: Url,
}

impl ClientConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration following the resolution priority order
    ///
    /// Unreadable or missing files fall back to compiled defaults with a warning;
    /// files that exist but fail to parse or validate are errors.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let Some(path) = resolve_config_path(cli_arg) else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                info!("Loading configuration from {}", path.display());
                Self::from_toml_str(&content)
            }
            Err(e) => {
                warn!(
                    "Config file {} could not be read ({}), using compiled defaults",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Replace the device URL (CLI or environment override)
    pub fn with_device_url(mut self, device_url: Option<String>) -> Result<Self> {
        if let Some(url) = device_url {
            self.device_url = url;
            self.validate()?;
        }
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        self.link.validate()?;
        if self.catalog.refresh_interval_ms == 0 || self.catalog.request_timeout_ms == 0 {
            return Err(Error::Config(
                "catalog intervals must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.device_url)
            .map_err(|e| Error::Config(format!("Invalid device_url '{}': {}", self.device_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config(format!(
                "device_url must use http or https, got '{}'",
                other
            ))),
        }
    }

    /// Derive the live-session, polling and discovery endpoints
    pub fn device_endpoints(&self) -> Result<DeviceEndpoints> {
        let base = self.base_url()?;
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| Error::Config(format!("Invalid endpoint path '{}': {}", path, e)))
        };

        let mut websocket = join("/ws")?;
        let ws_scheme = if base.scheme() == "https" { "wss" } else { "ws" };
        websocket
            .set_scheme(ws_scheme)
            .map_err(|_| Error::Config(format!("Cannot derive {} URL from {}", ws_scheme, base)))?;

        Ok(DeviceEndpoints {
            websocket,
            ams: join("/api/ams")?,
            catalog_discovery: join("/api/url")?,
        })
    }
}

/// Resolve the config file path by priority
///
/// Returns `None` when no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config file
    default_config_path().filter(|p| p.exists())
}

/// Platform default config path (`~/.config/filaman/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("filaman").join("config.toml"))
}
