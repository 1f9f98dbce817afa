//! Association records and their retrieval.
//!
//! A target restricted to several (domain, class) pairs fans out into one
//! lookup per pair. Each lookup is only ordered locally, so the merged list
//! is re-sorted by the method's significance before anything consumes it.

use crate::collaborators::{AssociationQuery, ConceptId, StatisticsStore};
use crate::context::QueryExecutionContext;
use crate::error::CollaboratorError;
use crate::options::{Method, QueryOptions};
use crate::resolver::{ResolvedAnchor, ResolvedTarget};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One pairwise statistic as returned by the statistics store. Which fields
/// are present depends on the method that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub concept_id_1: ConceptId,
    pub concept_id_2: ConceptId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_2_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_2_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<u32>,

    // obsExpRatio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<f64>,

    // relativeFrequency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_pair_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_2_count: Option<u64>,

    // chiSquare
    #[serde(rename = "p-value", default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_c1: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_c1_c2: Option<u64>,
    #[serde(rename = "n_c1_~c2", default, skip_serializing_if = "Option::is_none")]
    pub n_c1_not_c2: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_c2: Option<u64>,
    #[serde(rename = "n_~c1_c2", default, skip_serializing_if = "Option::is_none")]
    pub n_not_c1_c2: Option<u64>,
    #[serde(rename = "n_~c1_~c2", default, skip_serializing_if = "Option::is_none")]
    pub n_not_c1_not_c2: Option<u64>,
}

impl AssociationRecord {
    /// Number of patients with both concepts, whichever method produced the
    /// record.
    pub fn pair_count(&self) -> Option<u64> {
        self.n_c1_c2
            .or(self.observed_count)
            .or(self.concept_pair_count)
    }
}

impl Method {
    /// Larger is more significant. `None` when the record lacks the field
    /// this method ranks by.
    pub fn significance(self, record: &AssociationRecord) -> Option<f64> {
        match self {
            Method::ObsExpRatio => record.ln_ratio,
            Method::RelativeFrequency => record.relative_frequency,
            Method::ChiSquare => record.p_value.map(|p| -p),
        }
    }
}

/// Stable sort, most significant first; records without a score sink.
pub fn sort_by_significance(records: &mut [AssociationRecord], method: Method) {
    records.sort_by(|a, b| {
        match (method.significance(a), method.significance(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

pub struct AssociationRetriever<'a> {
    statistics: &'a dyn StatisticsStore,
}

impl<'a> AssociationRetriever<'a> {
    pub fn new(statistics: &'a dyn StatisticsStore) -> Self {
        Self { statistics }
    }

    pub fn retrieve(
        &self,
        ctx: &mut QueryExecutionContext,
        anchor: &ResolvedAnchor,
        target: &ResolvedTarget,
        options: &QueryOptions,
    ) -> Result<Vec<AssociationRecord>, CollaboratorError> {
        let base = AssociationQuery {
            method: options.method,
            concept_id_1: anchor.concept_id(),
            concept_id_2: None,
            dataset_id: options.dataset_id,
            domain_id: None,
            concept_class_id: None,
            confidence: options.confidence_interval,
        };

        let mut records = match target {
            ResolvedTarget::DomainClasses(pairs) => {
                let mut merged = Vec::new();
                for pair in pairs {
                    let query = AssociationQuery {
                        domain_id: Some(pair.domain_id.clone()),
                        concept_class_id: pair.concept_class_id.clone(),
                        ..base.clone()
                    };
                    let batch = self.statistics.query_association(&query)?;
                    ctx.debug(format!(
                        "{} associations between {} and domain {pair}",
                        batch.len(),
                        base.concept_id_1
                    ));
                    merged.extend(batch);
                }
                merged
            }
            ResolvedTarget::Concept { mapping, .. } => {
                let query = AssociationQuery {
                    concept_id_2: Some(mapping.omop_concept_id),
                    ..base
                };
                self.statistics.query_association(&query)?
            }
            ResolvedTarget::Unrestricted => self.statistics.query_association(&base)?,
        };

        sort_by_significance(&mut records, options.method);
        tracing::debug!(
            method = %options.method,
            records = records.len(),
            "retrieved association records"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ln(concept_id_2: ConceptId, ln_ratio: Option<f64>) -> AssociationRecord {
        AssociationRecord {
            concept_id_1: 1,
            concept_id_2,
            ln_ratio,
            ..Default::default()
        }
    }

    #[test]
    fn obs_exp_sorts_descending_and_sinks_missing() {
        let mut records = vec![ln(2, Some(0.5)), ln(3, None), ln(4, Some(2.0)), ln(5, Some(-1.0))];
        sort_by_significance(&mut records, Method::ObsExpRatio);
        let order: Vec<ConceptId> = records.iter().map(|r| r.concept_id_2).collect();
        assert_eq!(order, vec![4, 2, 5, 3]);
    }

    #[test]
    fn chi_square_sorts_smallest_p_first() {
        let mut records = vec![
            AssociationRecord { concept_id_2: 2, p_value: Some(0.2), ..Default::default() },
            AssociationRecord { concept_id_2: 3, p_value: Some(1e-9), ..Default::default() },
        ];
        sort_by_significance(&mut records, Method::ChiSquare);
        assert_eq!(records[0].concept_id_2, 3);
    }

    #[test]
    fn ties_keep_retrieval_order() {
        let mut records = vec![ln(7, Some(1.0)), ln(8, Some(1.0)), ln(9, Some(1.0))];
        sort_by_significance(&mut records, Method::ObsExpRatio);
        let order: Vec<ConceptId> = records.iter().map(|r| r.concept_id_2).collect();
        assert_eq!(order, vec![7, 8, 9]);
    }

    #[test]
    fn record_parses_cohd_field_names() {
        let record: AssociationRecord = serde_json::from_value(serde_json::json!({
            "concept_id_1": 192855,
            "concept_id_2": 2008271,
            "p-value": 1.0e-12,
            "n_c1_~c2": 4,
            "n_~c1_~c2": 900,
            "n_c1_c2": 20
        }))
        .unwrap();
        assert_eq!(record.p_value, Some(1.0e-12));
        assert_eq!(record.n_c1_not_c2, Some(4));
        assert_eq!(record.n_not_c1_not_c2, Some(900));
        assert_eq!(record.pair_count(), Some(20));
    }
}
