//! Configuration loading from TOML files

mod constants;
mod dots;

pub use constants::{
    BusConfig, CurveConfig, DiminishingConfig, EffectConfig, EngineConfig, SummonConfig,
};
pub use dots::{load_dot_presets, parse_dot_presets};

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Error loading engine constants or DoT presets
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read engine config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("malformed engine config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("rejected engine config: {0}")]
    ValidationError(String),
}

/// Load a TOML file and deserialize it
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load a TOML string and deserialize it
pub fn parse_toml<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    let config: T = toml::from_str(content)?;
    Ok(config)
}
