//! Engine configuration.
//!
//! Plain data only: the monitor is code and is attached on the engine itself.
//! Loadable from environment variables or from a TOML file with a
//! `[devtools]` table.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_NAME: &str = "rewind";

/// Smallest `max_age` that still leaves one action beside INIT.
pub const MIN_MAX_AGE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevtoolsConfig {
    /// Labels this engine's log lines.
    #[serde(default = "default_name")]
    pub name: String,
    /// Bound on staged actions (INIT included). `None` keeps everything.
    #[serde(default)]
    pub max_age: Option<usize>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Default for DevtoolsConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_age: None,
        }
    }
}

impl DevtoolsConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_age(mut self, max_age: usize) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_age {
            Some(max_age) if max_age < MIN_MAX_AGE => Err(ConfigError::MaxAgeTooSmall(max_age)),
            _ => Ok(()),
        }
    }

    /// Load from `REWIND_NAME` / `REWIND_MAX_AGE`, reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source. `REWIND_MAX_AGE` accepts a
    /// number or `unbounded`; unset or empty means unbounded.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let name = lookup("REWIND_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(default_name);

        let max_age = match lookup("REWIND_MAX_AGE").as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("unbounded") => None,
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "REWIND_MAX_AGE",
                value: raw.to_string(),
            })?),
        };

        let config = Self { name, max_age };
        config.validate()?;
        Ok(config)
    }

    /// Parse the `[devtools]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content).context("Failed to parse devtools config")?;
        file.devtools.validate()?;
        Ok(file.devtools)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    devtools: DevtoolsConfig,
}

/// Load and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<DevtoolsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    DevtoolsConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}
