//! Seams to the services this pipeline consumes but does not own.
//!
//! ```text
//!   QueryInterpreter ──► SchemaValidator   (structural check of the body)
//!          │         ──► OntologyService   (predicate/category closure)
//!          │         ──► ConceptMapper     (CURIE ↔ OMOP concept)
//!          └───────► StatisticsStore       (association records, concept detail)
//! ```
//!
//! All calls are blocking and request-scoped. Implementations decide their
//! own retry/timeout policy; the pipeline propagates their errors unchanged.

use crate::association::AssociationRecord;
use crate::biolink;
use crate::error::CollaboratorError;
use crate::options::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Native identifier of the OMOP concept space.
pub type ConceptId = i64;

/// CURIE → OMOP mapping chosen for a query node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmopMapping {
    pub omop_concept_id: ConceptId,
    pub omop_concept_name: String,
    pub distance: u32,
}

/// OMOP → external (preferably Biolink-prefixed) mapping for a KG node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiolinkMapping {
    pub target_curie: String,
    pub target_label: String,
    pub distance: u32,
}

/// Knobs forwarded verbatim to the concept mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperOptions {
    pub local_oxo: bool,
    pub distance: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_targets: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDetail {
    pub concept_id: ConceptId,
    pub concept_name: String,
    pub domain_id: String,
    #[serde(default)]
    pub concept_class_id: Option<String>,
}

/// One association lookup. `concept_id_2 = None` asks for every partner of
/// `concept_id_1`, optionally scoped to a domain/class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationQuery {
    pub method: Method,
    pub concept_id_1: ConceptId,
    pub concept_id_2: Option<ConceptId>,
    pub dataset_id: u32,
    pub domain_id: Option<String>,
    pub concept_class_id: Option<String>,
    pub confidence: f64,
}

pub trait SchemaValidator {
    /// Reject bodies that do not comply with the published TRAPI schema.
    fn validate(&self, query: &Value) -> Result<(), CollaboratorError>;
}

pub trait ConceptMapper {
    /// Map every CURIE to an OMOP concept, or `None` when no mapping exists.
    /// The returned map has one entry per input CURIE.
    fn map_to_omop(
        &self,
        curies: &[String],
        options: &MapperOptions,
    ) -> Result<BTreeMap<String, Option<OmopMapping>>, CollaboratorError>;

    /// Best external mapping of an OMOP concept under a category hint.
    fn map_from_omop(
        &self,
        concept_id: ConceptId,
        category: &str,
        options: &MapperOptions,
    ) -> Result<Option<BiolinkMapping>, CollaboratorError>;

    /// A preferred replacement for a query category, if the mapper has one.
    fn suggest_category(&self, category: &str) -> Option<String> {
        biolink::suggest_category(category).map(str::to_string)
    }
}

pub trait OntologyService {
    fn is_predicate(&self, term: &str) -> bool;

    /// `term` and everything below it. Empty for unknown terms.
    fn descendants(&self, term: &str) -> Vec<String>;

    /// `term` and everything above it. Empty for unknown terms.
    fn ancestors(&self, term: &str) -> Vec<String>;

    /// Canonical spelling of a category/predicate (prefix, casing).
    fn normalize(&self, term: &str) -> String;
}

pub trait StatisticsStore {
    /// Records for one lookup, ordered by the method's significance.
    fn query_association(
        &self,
        query: &AssociationQuery,
    ) -> Result<Vec<AssociationRecord>, CollaboratorError>;

    fn concept_detail(&self, concept_id: ConceptId)
        -> Result<Option<ConceptDetail>, CollaboratorError>;
}

/// The set of collaborators one pipeline run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub validator: &'a dyn SchemaValidator,
    pub mapper: &'a dyn ConceptMapper,
    pub ontology: &'a dyn OntologyService,
    pub statistics: &'a dyn StatisticsStore,
}
