//! File-based settings for the CLI
//!
//! Polling policy is configuration, not protocol; a TOML file can
//! override the defaults, e.g.
//!
//! ```toml
//! [poller]
//! far_threshold_secs = 10
//! near_interval_secs = 2
//! error_backoff_secs = 5
//! max_consecutive_errors = 6
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use config::{Config, File};
use serde::Deserialize;

use ledgerlock_engine::poller::PollerConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub far_threshold_secs: u64,
    pub near_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub max_consecutive_errors: u32,
}

impl Default for PollerSettings {
    fn default() -> Self {
        let defaults = PollerConfig::default();
        Self {
            far_threshold_secs: defaults.far_threshold.as_secs(),
            near_interval_secs: defaults.near_interval.as_secs(),
            error_backoff_secs: defaults.error_backoff.as_secs(),
            max_consecutive_errors: defaults.max_consecutive_errors,
        }
    }
}

impl PollerSettings {
    pub fn to_config(&self) -> PollerConfig {
        PollerConfig {
            far_threshold: Duration::from_secs(self.far_threshold_secs),
            near_interval: Duration::from_secs(self.near_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poller: PollerSettings,
}

impl Settings {
    /// Load settings from an optional file; missing keys keep defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .context("loading settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_policy() {
        let settings = Settings::load(None).unwrap();
        let config = settings.poller.to_config();
        let defaults = PollerConfig::default();

        assert_eq!(config.far_threshold, defaults.far_threshold);
        assert_eq!(config.near_interval, defaults.near_interval);
        assert_eq!(config.error_backoff, defaults.error_backoff);
        assert_eq!(config.max_consecutive_errors, defaults.max_consecutive_errors);
    }
}
