//! Resolved, invariant-safe configuration.
//!
//! Converts the optional, file-level [`SitekitConfig`] into concrete values so
//! the API client and module stores never handle missing fields.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::{ConfigError, SitekitConfig, expand_env_vars};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_THRESHOLD_HOURS: u32 = 48;
const DEFAULT_DATE_RANGE: &str = "last-28-days";

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api: ResolvedApiConfig,
    /// Connection age below which a zero report counts as still gathering.
    pub gathering_threshold: Duration,
    /// Initial `last-N-days` slug of the `core/user` date range.
    pub default_date_range: String,
}

#[derive(Clone)]
pub struct ResolvedApiConfig {
    pub base_url: Url,
    pub nonce: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ResolvedApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("nonce", &self.nonce.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResolvedConfig {
    pub fn from_config(config: &SitekitConfig) -> Result<Self, ConfigError> {
        let api = ResolvedApiConfig::from_config(config)?;

        let threshold_hours = config
            .gathering
            .as_ref()
            .and_then(|g| g.threshold_hours)
            .unwrap_or(DEFAULT_THRESHOLD_HOURS);
        if threshold_hours == 0 {
            return Err(ConfigError::Invalid {
                field: "gathering.threshold_hours",
                message: "must be greater than zero".to_string(),
            });
        }

        let default_date_range = config
            .date_range
            .as_ref()
            .and_then(|d| d.default.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATE_RANGE.to_string());
        if sitekit_types::date_range_days(&default_date_range).is_none() {
            return Err(ConfigError::Invalid {
                field: "date_range.default",
                message: format!("expected `last-N-days`, got `{default_date_range}`"),
            });
        }

        Ok(Self {
            api,
            gathering_threshold: Duration::from_secs(u64::from(threshold_hours) * 3600),
            default_date_range,
        })
    }

    /// Load the default config file and resolve it; defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        match SitekitConfig::load()? {
            Some(config) => Self::from_config(&config),
            None => Self::from_config(&SitekitConfig::default()),
        }
    }
}

impl ResolvedApiConfig {
    fn from_config(config: &SitekitConfig) -> Result<Self, ConfigError> {
        let api = config.api.as_ref();

        let raw_url = api
            .and_then(|a| a.base_url.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            field: "api.base_url",
            message: format!("{e}: {raw_url}"),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "api.base_url",
                message: format!("unsupported scheme `{}`", base_url.scheme()),
            });
        }

        let nonce = api
            .and_then(|a| a.nonce.as_deref())
            .map(expand_env_vars)
            .filter(|n| !n.trim().is_empty());

        let timeout_secs = api
            .and_then(|a| a.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(1);

        Ok(Self {
            base_url,
            nonce,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
