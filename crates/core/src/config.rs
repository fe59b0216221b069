//! Configuration loading for sortie.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::Result;

/// Load a TOML configuration file into `T`.
pub fn from_file<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let content = std::fs::read_to_string(path)?;
    from_str(&content)
}

/// Parse TOML configuration text into `T`.
pub fn from_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}
