//! Biolink ↔ OMOP vocabulary tables.
//!
//! COHD answers in the OMOP concept space. These tables decide which Biolink
//! categories and predicates it can answer for, and how categories translate
//! into OMOP (domain, concept class) pairs and back.

use serde::{Deserialize, Serialize};

pub const BIOLINK_PREFIX: &str = "biolink:";

/// The universal category: asking for it means "any concept".
pub const NAMED_THING: &str = "biolink:NamedThing";

/// Lowest-level categories COHD supports (ancestors are implied).
pub const SUPPORTED_CATEGORIES: &[&str] = &[
    "biolink:ChemicalSubstance",
    "biolink:DiseaseOrPhenotypicFeature",
    "biolink:Drug",
    "biolink:Procedure",
];

/// Lowest-level predicates COHD supports (ancestors are implied).
pub const SUPPORTED_PREDICATES: &[&str] = &["biolink:correlated_with"];

/// Predicate asserted on every knowledge-graph edge.
pub const DEFAULT_PREDICATE: &str = "biolink:correlated_with";

/// An OMOP (domain, concept class) pair. `concept_class_id = None` means the
/// whole domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainClass {
    pub domain_id: String,
    pub concept_class_id: Option<String>,
}

impl DomainClass {
    pub fn new(domain_id: &str, concept_class_id: Option<&str>) -> Self {
        Self {
            domain_id: domain_id.to_string(),
            concept_class_id: concept_class_id.map(str::to_string),
        }
    }
}

impl std::fmt::Display for DomainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.concept_class_id {
            Some(class) => write!(f, "{}:{}", self.domain_id, class),
            None => write!(f, "{}", self.domain_id),
        }
    }
}

/// OMOP (domain, class) pairs backing a supported Biolink category.
pub fn domain_classes_for(category: &str) -> Vec<DomainClass> {
    match category {
        "biolink:ChemicalSubstance" => vec![DomainClass::new("Drug", Some("Ingredient"))],
        "biolink:DiseaseOrPhenotypicFeature" => vec![DomainClass::new("Condition", None)],
        "biolink:Drug" => vec![DomainClass::new("Drug", None)],
        "biolink:Procedure" => vec![DomainClass::new("Procedure", None)],
        _ => Vec::new(),
    }
}

/// Default Biolink category for an OMOP concept's domain/class.
pub fn category_for_domain(domain_id: &str, concept_class_id: Option<&str>) -> &'static str {
    match (domain_id, concept_class_id) {
        ("Condition", _) => "biolink:DiseaseOrPhenotypicFeature",
        ("Drug", Some("Ingredient")) => "biolink:ChemicalSubstance",
        ("Drug", _) => "biolink:Drug",
        ("Procedure", _) => "biolink:Procedure",
        _ => NAMED_THING,
    }
}

/// Categories COHD answers better under a broader name.
pub fn suggest_category(category: &str) -> Option<&'static str> {
    match category {
        "biolink:Disease" | "biolink:PhenotypicFeature" => {
            Some("biolink:DiseaseOrPhenotypicFeature")
        }
        _ => None,
    }
}

pub fn omop_curie(concept_id: i64) -> String {
    format!("OMOP:{concept_id}")
}

pub fn athena_url(concept_id: i64) -> String {
    format!("https://athena.ohdsi.org/search-terms/terms/{concept_id}")
}
