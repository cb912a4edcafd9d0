//! Runtime configuration.
//!
//! Values come from a JSON document (`MiseConfig::from_json`) or from
//! `MISE_*` environment variables (`MiseConfig::from_env`). Missing or
//! unparsable variables fall back to the default and are logged.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::UrgencyPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("malformed config document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiseConfig {
    /// REST base URL. `None` runs against the in-memory API.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Auto-refresh period of the todo feed.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Delay before the follow-up fetch after a successful completion.
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,
    /// How many completed todos the feed shows.
    #[serde(default = "default_completed_preview")]
    pub completed_preview: usize,
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
    #[serde(default)]
    pub urgency: UrgencyPolicy,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_refresh_interval_secs() -> u64 {
    5 * 60
}

fn default_reconcile_delay_ms() -> u64 {
    500
}

fn default_completed_preview() -> usize {
    3
}

fn default_max_description_len() -> usize {
    200
}

impl Default for MiseConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            reconcile_delay_ms: default_reconcile_delay_ms(),
            completed_preview: default_completed_preview(),
            max_description_len: default_max_description_len(),
            urgency: UrgencyPolicy::default(),
        }
    }
}

impl MiseConfig {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let urgency = UrgencyPolicy {
            utc_offset_minutes: try_load(
                &lookup,
                "MISE_UTC_OFFSET_MINUTES",
                defaults.urgency.utc_offset_minutes,
            ),
            now_lead_minutes: try_load(
                &lookup,
                "MISE_NOW_LEAD_MINUTES",
                defaults.urgency.now_lead_minutes,
            ),
            overdue_grace_minutes: try_load(
                &lookup,
                "MISE_OVERDUE_GRACE_MINUTES",
                defaults.urgency.overdue_grace_minutes,
            ),
            upcoming_horizon_days: try_load(
                &lookup,
                "MISE_UPCOMING_HORIZON_DAYS",
                defaults.urgency.upcoming_horizon_days,
            ),
        };

        let config = Self {
            api_base_url: lookup("MISE_API_URL").filter(|v| !v.trim().is_empty()),
            api_token: lookup("MISE_API_TOKEN").filter(|v| !v.trim().is_empty()),
            request_timeout_secs: try_load(
                &lookup,
                "MISE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            refresh_interval_secs: try_load(
                &lookup,
                "MISE_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval_secs,
            ),
            reconcile_delay_ms: try_load(
                &lookup,
                "MISE_RECONCILE_DELAY_MS",
                defaults.reconcile_delay_ms,
            ),
            completed_preview: try_load(
                &lookup,
                "MISE_COMPLETED_PREVIEW",
                defaults.completed_preview,
            ),
            max_description_len: try_load(
                &lookup,
                "MISE_MAX_DESCRIPTION_LEN",
                defaults.max_description_len,
            ),
            urgency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(invalid("refresh_interval_secs", "must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than zero"));
        }
        if self.max_description_len == 0 {
            return Err(invalid("max_description_len", "must be greater than zero"));
        }
        if let Some(url) = &self.api_base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }

        let urgency = &self.urgency;
        if urgency.utc_offset_minutes.abs() > 14 * 60 {
            return Err(invalid("urgency.utc_offset_minutes", "must be within +/-14h"));
        }
        if urgency.now_lead_minutes < 0 {
            return Err(invalid("urgency.now_lead_minutes", "must not be negative"));
        }
        if urgency.overdue_grace_minutes < 0 {
            return Err(invalid("urgency.overdue_grace_minutes", "must not be negative"));
        }
        if urgency.upcoming_horizon_days == 0 {
            return Err(invalid("urgency.upcoming_horizon_days", "must be at least one day"));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}
