//! Dashboard configuration.
//!
//! Read from a TOML file, then overridden by environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `CIVIC_WATCH_VISIBILITY` | `visibility` (`all_statuses` or `pending_only`) |
//! | `CIVIC_WATCH_EVENT_BUFFER_LIMIT` | `event_buffer_limit` |
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;

use civic_watch_analytics_models::FilterCriteria;
use civic_watch_store::Visibility;
use civic_watch_store::store::DEFAULT_EVENT_BUFFER_LIMIT;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable overriding [`DashboardConfig::visibility`].
pub const VISIBILITY_ENV: &str = "CIVIC_WATCH_VISIBILITY";

/// Environment variable overriding [`DashboardConfig::event_buffer_limit`].
pub const EVENT_BUFFER_LIMIT_ENV: &str = "CIVIC_WATCH_EVENT_BUFFER_LIMIT";

/// Settings for a [`LiveDashboard`](crate::LiveDashboard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Statuses kept by the report store.
    pub visibility: Visibility,
    /// Changes buffered while a load is in flight before a reload is
    /// forced.
    pub event_buffer_limit: usize,
    /// Criteria the map and list start with.
    pub default_criteria: FilterCriteria,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            visibility: Visibility::AllStatuses,
            event_buffer_limit: DEFAULT_EVENT_BUFFER_LIMIT,
            default_criteria: FilterCriteria::default(),
        }
    }
}

impl DashboardConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if it is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::info!("Loaded dashboard config from {}", path.display());
        Ok(config)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name. Unparseable values
    /// are logged and ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(VISIBILITY_ENV) {
            match raw.trim().parse::<Visibility>() {
                Ok(visibility) => self.visibility = visibility,
                Err(_) => log::warn!("Ignoring invalid {VISIBILITY_ENV}={raw}"),
            }
        }

        if let Some(raw) = lookup(EVENT_BUFFER_LIMIT_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => self.event_buffer_limit = limit,
                _ => log::warn!("Ignoring invalid {EVENT_BUFFER_LIMIT_ENV}={raw}"),
            }
        }

        self
    }
}
