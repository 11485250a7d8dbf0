//! Configuration loading for review sessions.
//!
//! Reads `~/.specreview/config.toml`. A missing file yields defaults so a
//! fresh install works without any setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, Result};
use crate::ids::{IdGenerator, SequentialIdGenerator, UlidIdGenerator};
use crate::registry::ReducerPolicy;

pub const DEFAULT_ID_PREFIX: &str = "pe_";
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReviewConfig {
    pub session: SessionConfig,
    pub ids: IdsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reject re-documenting a staged pending endpoint instead of overwriting it.
    pub strict_staged_reuse: bool,
    pub id_prefix: String,
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strict_staged_reuse: false,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdGeneratorKind {
    #[default]
    Ulid,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdsConfig {
    pub generator: IdGeneratorKind,
}

impl ReviewConfig {
    pub fn policy(&self) -> ReducerPolicy {
        ReducerPolicy {
            strict_staged_reuse: self.session.strict_staged_reuse,
        }
    }

    /// Builds the id generator selected by `[ids] generator`.
    pub fn id_generator(&self) -> Box<dyn IdGenerator> {
        let prefix = self.session.id_prefix.clone();
        match self.ids.generator {
            IdGeneratorKind::Ulid => Box::new(UlidIdGenerator::with_prefix(prefix)),
            IdGeneratorKind::Sequential => Box::new(SequentialIdGenerator::with_prefix(prefix)),
        }
    }
}

/// Returns the path to the specreview directory (~/.specreview).
pub fn get_specreview_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".specreview"))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> Option<PathBuf> {
    get_specreview_dir().map(|d| d.join("config.toml"))
}

/// Loads configuration from `path`, or the default location when `None`.
pub fn load_config(path: Option<&Path>) -> Result<ReviewConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("Home directory not found; using default config");
                return Ok(ReviewConfig::default());
            }
        },
    };

    if !config_path.exists() {
        return Ok(ReviewConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ReviewError::Io {
        context: format!("reading config {}", config_path.display()),
        source,
    })?;
    let config =
        toml::from_str::<ReviewConfig>(&content).map_err(|err| ReviewError::ConfigMalformed {
            path: config_path.clone(),
            details: err.to_string(),
        })?;
    tracing::debug!(path = %config_path.display(), "Loaded review config");
    Ok(config)
}
