//! Service-wide defaults and limits.
//!
//! `ServiceConfig::default()` carries the values COHD ships with;
//! `from_env()` lets a deployment override them without a rebuild.

use crate::context::LogLevel;
use crate::options::Method;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub default_method: Method,
    pub default_dataset_id: u32,
    pub default_min_cooccurrence: u64,
    pub default_confidence_interval: f64,
    pub default_local_oxo: bool,
    pub default_mapping_distance: u32,
    pub default_biolink_only: bool,
    pub default_max_results: usize,
    /// Hard ceiling; callers cannot ask for more results than this.
    pub limit_max_results: usize,
    pub default_log_level: LogLevel,
    pub reasoner_id: String,
    pub tool_version: String,
    pub schema_version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_method: Method::ObsExpRatio,
            default_dataset_id: 3,
            default_min_cooccurrence: 0,
            default_confidence_interval: 0.99,
            default_local_oxo: true,
            default_mapping_distance: 3,
            default_biolink_only: true,
            default_max_results: 500,
            limit_max_results: 500,
            default_log_level: LogLevel::Warning,
            reasoner_id: "COHD".to_string(),
            tool_version: "COHD 3.0.0".to_string(),
            schema_version: "1.1.0".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `COHD_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Load a JSON config file; missing fields keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "COHD_DEFAULT_METHOD", &mut self.default_method);
        override_from(&lookup, "COHD_DEFAULT_DATASET_ID", &mut self.default_dataset_id);
        override_from(
            &lookup,
            "COHD_DEFAULT_MIN_COOCCURRENCE",
            &mut self.default_min_cooccurrence,
        );
        override_from(
            &lookup,
            "COHD_DEFAULT_CONFIDENCE_INTERVAL",
            &mut self.default_confidence_interval,
        );
        override_from(&lookup, "COHD_DEFAULT_LOCAL_OXO", &mut self.default_local_oxo);
        override_from(
            &lookup,
            "COHD_DEFAULT_MAPPING_DISTANCE",
            &mut self.default_mapping_distance,
        );
        override_from(&lookup, "COHD_DEFAULT_BIOLINK_ONLY", &mut self.default_biolink_only);
        override_from(&lookup, "COHD_LIMIT_MAX_RESULTS", &mut self.limit_max_results);
        override_from(&lookup, "COHD_DEFAULT_LOG_LEVEL", &mut self.default_log_level);

        if !(0.0..1.0).contains(&self.default_confidence_interval) {
            tracing::warn!(
                value = self.default_confidence_interval,
                "default confidence interval outside [0, 1); using 0.99"
            );
            self.default_confidence_interval = 0.99;
        }
        self.default_max_results = self.default_max_results.min(self.limit_max_results);
    }
}

fn override_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring malformed config override"),
    }
}
