//! Result criteria: independent, parameterized predicates over one record.

use crate::association::AssociationRecord;
use crate::options::QueryOptions;
use std::fmt;

pub trait Criterion: fmt::Debug {
    fn name(&self) -> &'static str;

    fn evaluate(&self, record: &AssociationRecord) -> bool;
}

/// Minimum number of patients with both concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinCooccurrence {
    pub min: u64,
}

impl Criterion for MinCooccurrence {
    fn name(&self) -> &'static str {
        "min_cooccurrence"
    }

    fn evaluate(&self, record: &AssociationRecord) -> bool {
        record.pair_count().is_some_and(|count| count >= self.min)
    }
}

/// Score threshold whose meaning follows the record's statistic:
/// a maximum p-value for chi-square, a signed floor/ceiling on `ln_ratio`,
/// a minimum relative frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreThreshold {
    pub threshold: f64,
}

impl Criterion for ScoreThreshold {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn evaluate(&self, record: &AssociationRecord) -> bool {
        let t = self.threshold;
        if let Some(p) = record.p_value {
            p < t
        } else if let Some(ln_ratio) = record.ln_ratio {
            if t >= 0.0 {
                ln_ratio >= t
            } else {
                ln_ratio <= t
            }
        } else if let Some(freq) = record.relative_frequency {
            freq >= t
        } else {
            false
        }
    }
}

/// The record's confidence interval must exclude zero, i.e. the association
/// is significant at the requested confidence level. The level itself is
/// applied by the statistics store when it computes the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceExcludesNull;

impl Criterion for ConfidenceExcludesNull {
    fn name(&self) -> &'static str {
        "confidence_interval"
    }

    fn evaluate(&self, record: &AssociationRecord) -> bool {
        match record.confidence_interval {
            Some([lo, hi]) => lo > 0.0 || hi < 0.0,
            None => false,
        }
    }
}

/// Conjunction of the active criteria, evaluated in order.
#[derive(Debug, Default)]
pub struct CriteriaFilter {
    criteria: Vec<Box<dyn Criterion>>,
}

impl CriteriaFilter {
    pub fn new(criteria: Vec<Box<dyn Criterion>>) -> Self {
        Self { criteria }
    }

    /// Criteria implied by the resolved options:
    /// co-occurrence floor (if > 0), then threshold (if given), then the
    /// confidence criterion (ratio methods with a positive interval only).
    pub fn from_options(options: &QueryOptions) -> Self {
        let mut criteria: Vec<Box<dyn Criterion>> = Vec::new();
        if options.min_cooccurrence > 0 {
            criteria.push(Box::new(MinCooccurrence {
                min: options.min_cooccurrence,
            }));
        }
        if let Some(threshold) = options.threshold {
            criteria.push(Box::new(ScoreThreshold { threshold }));
        }
        if options.method.is_ratio_based() && options.confidence_interval > 0.0 {
            criteria.push(Box::new(ConfidenceExcludesNull));
        }
        Self { criteria }
    }

    pub fn accepts(&self, record: &AssociationRecord) -> bool {
        self.criteria.iter().all(|c| c.evaluate(record))
    }

    /// Name of the first criterion the record fails, if any.
    pub fn first_failure(&self, record: &AssociationRecord) -> Option<&'static str> {
        self.criteria
            .iter()
            .find(|c| !c.evaluate(record))
            .map(|c| c.name())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.criteria.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}
