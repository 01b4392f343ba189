//! Configuration loading for viking.
//!
//! The OpenViking server and this tool share one JSON config file
//! (`ov.conf`). Only a handful of fields are read here: the ones `info`
//! displays and the ones needed to reach the server.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "OPENVIKING_CONFIG_FILE";

/// Environment variable that overrides the server URL.
pub const URL_ENV: &str = "OPENVIKING_URL";

/// Config location used when no override is set.
pub const DEFAULT_CONFIG_PATH: &str = "~/.openviking/ov.conf";

/// Server address used when neither env nor config name one.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:1933";

/// Errors that can occur when loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level structure of `ov.conf`. Unknown sections are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct OvConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vlm: VlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub dense: DenseEmbeddingConfig,
}

/// Dense embedding model settings.
#[derive(Debug, Default, Deserialize)]
pub struct DenseEmbeddingConfig {
    pub model: Option<String>,
    /// Kept loose: configs in the wild carry both `1024` and `"1024"`.
    pub dimension: Option<serde_json::Value>,
    pub api_base: Option<String>,
}

/// Vision-language model settings.
#[derive(Debug, Default, Deserialize)]
pub struct VlmConfig {
    pub model: Option<String>,
}

/// How to reach the OpenViking server.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl OvConfig {
    /// Load and parse the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read and
    /// `ConfigError::Parse` if it is not valid JSON of the expected shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse config contents.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// The display fields `info` prints, with placeholders filled in.
    #[must_use]
    pub fn summary(&self) -> ConfigSummary {
        let dense = &self.embedding.dense;
        ConfigSummary {
            embedding_model: dense.model.clone().unwrap_or_else(|| "not set".to_string()),
            embedding_dimension: dense
                .dimension
                .as_ref()
                .map_or_else(|| "auto".to_string(), display_value),
            vlm_model: self.vlm.model.clone().unwrap_or_else(|| "not set".to_string()),
            api_base: dense.api_base.clone().unwrap_or_else(|| "not set".to_string()),
        }
    }
}

/// Human-readable view of the model settings in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSummary {
    pub embedding_model: String,
    pub embedding_dimension: String,
    pub vlm_model: String,
    pub api_base: String,
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve the config file path from the environment.
#[must_use]
pub fn config_path() -> PathBuf {
    resolve_config_path(std::env::var_os(CONFIG_ENV))
}

/// Resolve the config file path from an optional override.
///
/// An empty override counts as unset.
#[must_use]
pub fn resolve_config_path(env_override: Option<OsString>) -> PathBuf {
    match env_override {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => expand_tilde(DEFAULT_CONFIG_PATH),
    }
}

/// Resolve the server URL from the environment and the (optional) config.
#[must_use]
pub fn server_url(config: Option<&OvConfig>) -> String {
    resolve_server_url(std::env::var(URL_ENV).ok(), config)
}

/// Pick the server URL: env override, then `server.url`, then the default.
///
/// Trailing slashes are stripped so paths can be appended directly.
#[must_use]
pub fn resolve_server_url(env_override: Option<String>, config: Option<&OvConfig>) -> String {
    let url = env_override
        .filter(|u| !u.trim().is_empty())
        .or_else(|| config.and_then(|c| c.server.url.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    url.trim().trim_end_matches('/').to_string()
}

/// Expand ~ to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(base_dirs) = BaseDirs::new()
    {
        return base_dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}
