//! In-memory collaborators backed by a JSON fixture.
//!
//! Used by the CLI and by tests. Both stores record the lookups they receive
//! so callers can assert on how the pipeline talked to them.

use crate::association::{sort_by_significance, AssociationRecord};
use crate::collaborators::{
    AssociationQuery, BiolinkMapping, ConceptDetail, ConceptId, ConceptMapper, MapperOptions,
    OmopMapping, StatisticsStore,
};
use crate::error::CollaboratorError;
use crate::options::Method;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

/// One association row in a fixture: the record plus the method that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureAssociation {
    pub method: Method,
    #[serde(flatten)]
    pub record: AssociationRecord,
}

/// Everything the in-memory collaborators serve, in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub concepts: Vec<ConceptDetail>,
    pub associations: Vec<FixtureAssociation>,
    pub curie_to_omop: BTreeMap<String, OmopMapping>,
    pub omop_to_biolink: BTreeMap<ConceptId, BiolinkMapping>,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryStatistics {
    concepts: BTreeMap<ConceptId, ConceptDetail>,
    associations: Vec<FixtureAssociation>,
    outage: Option<String>,
    calls: RefCell<Vec<AssociationQuery>>,
    detail_calls: RefCell<Vec<ConceptId>>,
}

impl InMemoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        let mut store = Self::new();
        for concept in &fixture.concepts {
            store = store.with_concept(concept.clone());
        }
        for row in &fixture.associations {
            store = store.with_association(row.method, row.record.clone());
        }
        store
    }

    pub fn with_concept(mut self, concept: ConceptDetail) -> Self {
        self.concepts.insert(concept.concept_id, concept);
        self
    }

    pub fn with_association(mut self, method: Method, record: AssociationRecord) -> Self {
        self.associations.push(FixtureAssociation { method, record });
        self
    }

    /// Make every association lookup fail as if the store were down.
    pub fn with_outage(mut self, message: impl Into<String>) -> Self {
        self.outage = Some(message.into());
        self
    }

    /// Association lookups received so far, in call order.
    pub fn calls(&self) -> Vec<AssociationQuery> {
        self.calls.borrow().clone()
    }

    pub fn detail_calls(&self) -> Vec<ConceptId> {
        self.detail_calls.borrow().clone()
    }

    fn matches(&self, query: &AssociationQuery, row: &FixtureAssociation) -> bool {
        let record = &row.record;
        if row.method != query.method || record.concept_id_1 != query.concept_id_1 {
            return false;
        }
        if record.dataset_id.is_some_and(|d| d != query.dataset_id) {
            return false;
        }
        if query.concept_id_2.is_some_and(|id| id != record.concept_id_2) {
            return false;
        }
        let partner = self.concepts.get(&record.concept_id_2);
        if let Some(domain) = &query.domain_id {
            let partner_domain = record
                .concept_2_domain
                .as_deref()
                .or(partner.map(|c| c.domain_id.as_str()));
            if partner_domain != Some(domain.as_str()) {
                return false;
            }
        }
        if let Some(class) = &query.concept_class_id {
            let partner_class = partner.and_then(|c| c.concept_class_id.as_deref());
            if partner_class != Some(class.as_str()) {
                return false;
            }
        }
        true
    }
}

impl StatisticsStore for InMemoryStatistics {
    fn query_association(
        &self,
        query: &AssociationQuery,
    ) -> Result<Vec<AssociationRecord>, CollaboratorError> {
        self.calls.borrow_mut().push(query.clone());
        if let Some(message) = &self.outage {
            return Err(CollaboratorError::Unavailable {
                service: "statistics store",
                message: message.clone(),
            });
        }

        let mut records: Vec<AssociationRecord> = self
            .associations
            .iter()
            .filter(|row| self.matches(query, row))
            .map(|row| {
                let mut record = row.record.clone();
                record.dataset_id.get_or_insert(query.dataset_id);
                if let Some(partner) = self.concepts.get(&record.concept_id_2) {
                    record
                        .concept_2_name
                        .get_or_insert_with(|| partner.concept_name.clone());
                    record
                        .concept_2_domain
                        .get_or_insert_with(|| partner.domain_id.clone());
                }
                record
            })
            .collect();
        sort_by_significance(&mut records, query.method);
        Ok(records)
    }

    fn concept_detail(
        &self,
        concept_id: ConceptId,
    ) -> Result<Option<ConceptDetail>, CollaboratorError> {
        self.detail_calls.borrow_mut().push(concept_id);
        Ok(self.concepts.get(&concept_id).cloned())
    }
}

// ============================================================================
// Concept mapping
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryConceptMapper {
    to_omop: BTreeMap<String, OmopMapping>,
    to_biolink: BTreeMap<ConceptId, BiolinkMapping>,
    batches: RefCell<Vec<Vec<String>>>,
}

impl InMemoryConceptMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        Self {
            to_omop: fixture.curie_to_omop.clone(),
            to_biolink: fixture.omop_to_biolink.clone(),
            batches: RefCell::default(),
        }
    }

    pub fn with_omop(mut self, curie: &str, mapping: OmopMapping) -> Self {
        self.to_omop.insert(curie.to_string(), mapping);
        self
    }

    pub fn with_biolink(mut self, concept_id: ConceptId, mapping: BiolinkMapping) -> Self {
        self.to_biolink.insert(concept_id, mapping);
        self
    }

    /// CURIE batches passed to `map_to_omop`, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.borrow().clone()
    }
}

impl ConceptMapper for InMemoryConceptMapper {
    fn map_to_omop(
        &self,
        curies: &[String],
        options: &MapperOptions,
    ) -> Result<BTreeMap<String, Option<OmopMapping>>, CollaboratorError> {
        self.batches.borrow_mut().push(curies.to_vec());
        Ok(curies
            .iter()
            .map(|curie| {
                let mapping = self
                    .to_omop
                    .get(curie)
                    .filter(|m| m.distance <= options.distance)
                    .cloned();
                (curie.clone(), mapping)
            })
            .collect())
    }

    fn map_from_omop(
        &self,
        concept_id: ConceptId,
        _category: &str,
        options: &MapperOptions,
    ) -> Result<Option<BiolinkMapping>, CollaboratorError> {
        Ok(self
            .to_biolink
            .get(&concept_id)
            .filter(|m| m.distance <= options.distance)
            .cloned())
    }
}
