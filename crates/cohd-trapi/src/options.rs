//! `query_options` normalization.
//!
//! Every option has a documented default; a missing or malformed value falls
//! back to it instead of rejecting the request. The only option that can
//! reject is `method`, when it names a method COHD does not implement.

use crate::collaborators::MapperOptions;
use crate::config::ServiceConfig;
use crate::error::{Rejection, RejectionCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Association statistic used for retrieval, filtering and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "relativeFrequency")]
    RelativeFrequency,
    #[serde(rename = "obsExpRatio")]
    ObsExpRatio,
    #[serde(rename = "chiSquare")]
    ChiSquare,
}

impl Method {
    pub const ALL: [Method; 3] = [
        Method::RelativeFrequency,
        Method::ObsExpRatio,
        Method::ChiSquare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::RelativeFrequency => "relativeFrequency",
            Method::ObsExpRatio => "obsExpRatio",
            Method::ChiSquare => "chiSquare",
        }
    }

    /// Methods whose records carry a ratio confidence interval.
    pub fn is_ratio_based(self) -> bool {
        matches!(self, Method::ObsExpRatio)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown method `{}`", self.0)
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Fully resolved options for one request; echoed in the response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub method: Method,
    pub dataset_id: u32,
    pub min_cooccurrence: u64,
    pub confidence_interval: f64,
    pub local_oxo: bool,
    pub mapping_distance: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_targets: Option<Map<String, Value>>,
    pub biolink_only: bool,
    pub max_results: usize,
    /// Score threshold; no default, the filter is off unless given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl QueryOptions {
    pub fn defaults(config: &ServiceConfig) -> Self {
        Self {
            method: config.default_method,
            dataset_id: config.default_dataset_id,
            min_cooccurrence: config.default_min_cooccurrence,
            confidence_interval: config.default_confidence_interval,
            local_oxo: config.default_local_oxo,
            mapping_distance: config.default_mapping_distance,
            ontology_targets: None,
            biolink_only: config.default_biolink_only,
            max_results: config.default_max_results.min(config.limit_max_results),
            threshold: None,
        }
    }

    pub fn resolve(raw: Option<&Map<String, Value>>, config: &ServiceConfig) -> Result<Self, Rejection> {
        let mut options = Self::defaults(config);
        let Some(raw) = raw else {
            return Ok(options);
        };

        if let Some(method) = raw.get("method").and_then(Value::as_str) {
            if !method.is_empty() {
                options.method = method.parse().map_err(|_| {
                    let supported: Vec<&str> = Method::ALL.iter().map(|m| m.as_str()).collect();
                    Rejection::new(
                        RejectionCode::UnsupportedMethod,
                        format!(
                            "Query method \"{method}\" not supported. Options are: {}",
                            supported.join(",")
                        ),
                    )
                })?;
            }
        }

        if let Some(dataset_id) = raw.get("dataset_id").and_then(as_whole_number) {
            if dataset_id > 0 {
                options.dataset_id = u32::try_from(dataset_id).unwrap_or(options.dataset_id);
            }
        }

        if let Some(min) = raw.get("min_cooccurrence").and_then(Value::as_f64) {
            if min.is_finite() {
                options.min_cooccurrence = min.max(0.0).ceil() as u64;
            }
        }

        if let Some(ci) = raw.get("confidence_interval").and_then(Value::as_f64) {
            if (0.0..1.0).contains(&ci) {
                options.confidence_interval = ci;
            }
        }

        if let Some(local_oxo) = raw.get("local_oxo").and_then(Value::as_bool) {
            options.local_oxo = local_oxo;
        }

        if let Some(distance) = raw.get("mapping_distance").and_then(as_whole_number) {
            options.mapping_distance = u32::try_from(distance).unwrap_or(options.mapping_distance);
        }

        if let Some(targets) = raw.get("ontology_targets").and_then(Value::as_object) {
            if !targets.is_empty() {
                options.ontology_targets = Some(targets.clone());
            }
        }

        if let Some(biolink_only) = raw.get("biolink_only").and_then(Value::as_bool) {
            options.biolink_only = biolink_only;
        }

        // A fractional cap stops at the first count that reaches it.
        if let Some(max) = raw.get("max_results").and_then(Value::as_f64) {
            if max.is_finite() && max > 0.0 {
                let max = usize::try_from(max.ceil() as u64).unwrap_or(usize::MAX);
                options.max_results = max.min(config.limit_max_results);
            }
        }

        if let Some(threshold) = raw.get("threshold").and_then(Value::as_f64) {
            if threshold.is_finite() {
                options.threshold = Some(threshold);
            }
        }

        Ok(options)
    }

    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            local_oxo: self.local_oxo,
            distance: self.mapping_distance,
            ontology_targets: self.ontology_targets.clone(),
        }
    }
}

/// Non-negative integral JSON number (`3` and `3.0` both qualify).
fn as_whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}
