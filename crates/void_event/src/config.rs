//! Event configuration
//!
//! ```toml
//! link_repair = "reset_to_constant"
//! warn_on_unavailable_links = true
//! warn_on_missing_members = true
//! ```

use crate::links::LinkRepair;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Behaviour switches shared by the calls of one event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// What happens to return value links whose producer disappears
    pub link_repair: LinkRepair,
    /// Warn when a return value link has no value this invocation
    pub warn_on_unavailable_links: bool,
    /// Warn when a persistent call cannot be resolved
    pub warn_on_missing_members: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            link_repair: LinkRepair::Preserve,
            warn_on_unavailable_links: true,
            warn_on_missing_members: true,
        }
    }
}

impl EventConfig {
    /// Set the link repair policy
    pub fn with_link_repair(mut self, link_repair: LinkRepair) -> Self {
        self.link_repair = link_repair;
        self
    }

    /// Silence resolution and link warnings
    pub fn quiet(mut self) -> Self {
        self.warn_on_unavailable_links = false;
        self.warn_on_missing_members = false;
        self
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
