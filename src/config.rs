//! Server configuration.
//!
//! Configuration may be specified in a TOML file; every field has a default
//! so a missing file means a usable in-memory demo server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which backend the server mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Fixed in-memory files.
    Mem,
    /// Files under a host directory (`disk-root`).
    Disk,
    /// Live process listing, rebuilt on every lookup.
    #[cfg(target_os = "linux")]
    Proc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Path the filesystem announces to the routing service.
    pub mount: String,

    pub backend: BackendKind,

    /// Host directory served by the disk backend.
    pub disk_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount: "/files".to_owned(),
            backend: BackendKind::Mem,
            disk_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
