//! Configuration loading for the Site Kit datastore.
//!
//! The boundary type [`SitekitConfig`] mirrors the TOML file, where every field
//! is optional. Core code never sees it directly: [`ResolvedConfig`] converts
//! it into concrete values with defaults applied and invariants checked.
//!
//! ```toml
//! [api]
//! base_url = "https://example.com"
//! nonce = "${WP_NONCE}"
//! timeout_seconds = 30
//!
//! [gathering]
//! threshold_hours = 48
//!
//! [date_range]
//! default = "last-28-days"
//! ```

mod resolved;

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

pub use resolved::{ResolvedApiConfig, ResolvedConfig};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SITEKIT_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct SitekitConfig {
    pub api: Option<ApiConfig>,
    pub gathering: Option<GatheringConfig>,
    pub date_range: Option<DateRangeConfig>,
}

#[derive(Default, Deserialize)]
pub struct ApiConfig {
    /// Site root URL; REST routes are appended to it.
    pub base_url: Option<String>,
    /// WordPress REST nonce, sent as `X-WP-Nonce`. Supports `${ENV_VAR}`.
    pub nonce: Option<String>,
    pub timeout_seconds: Option<u64>,
}

// Manual Debug impl to prevent leaking the nonce in logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "nonce",
                &if self.nonce.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// When a freshly connected data source counts as still gathering data.
#[derive(Debug, Default, Deserialize)]
pub struct GatheringConfig {
    /// Connection age below which an empty report means "gathering". Default: 48.
    pub threshold_hours: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeConfig {
    /// Initial date range slug, `last-N-days`. Default: `last-28-days`.
    pub default: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl SitekitConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

/// `$SITEKIT_CONFIG`, else `<config dir>/sitekit/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|dir| dir.join("sitekit").join("config.toml"))
}

/// Replace `${VAR}` references with environment values (empty when unset).
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
