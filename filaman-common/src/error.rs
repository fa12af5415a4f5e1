//! Common error types for FilaMan

use thiserror::Error;

/// Common result type for FilaMan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across FilaMan crates
#[derive(Error, Debug)]
pub enum Error {
    /// TOML configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
