//! Shared fixture and stub ontology for the pipeline tests.

#![allow(dead_code)]

use cohd_trapi::{
    AssociationRecord, BiolinkMapping, Collaborators, ConceptDetail, Fixture,
    InMemoryConceptMapper, InMemoryStatistics, Method, OmopMapping, OntologyService, Outcome,
    QueryError, QueryInterpreter, ServiceConfig, TrapiShapeValidator,
};
use serde_json::{json, Value};

pub const BLADDER_CANCER: i64 = 192855;
pub const DICLOFENAC: i64 = 1124300;
pub const DICLOFENAC_TABLET: i64 = 19019073;
pub const CELECOXIB: i64 = 1118084;
pub const CELECOXIB_CAPSULE: i64 = 19115197;
pub const CYSTOSCOPY: i64 = 4324693;
pub const TYPE_2_DIABETES: i64 = 201826;

/// Parent links of a small Biolink slice.
const HIERARCHY: &[(&str, &str)] = &[
    ("biolink:ChemicalSubstance", "biolink:NamedThing"),
    ("biolink:Drug", "biolink:ChemicalSubstance"),
    ("biolink:DiseaseOrPhenotypicFeature", "biolink:NamedThing"),
    ("biolink:Disease", "biolink:DiseaseOrPhenotypicFeature"),
    ("biolink:PhenotypicFeature", "biolink:DiseaseOrPhenotypicFeature"),
    ("biolink:Procedure", "biolink:NamedThing"),
    ("biolink:Gene", "biolink:NamedThing"),
    ("biolink:correlated_with", "biolink:related_to"),
    ("biolink:positively_correlated_with", "biolink:correlated_with"),
    ("biolink:treats", "biolink:related_to"),
];

pub struct StubOntology;

impl StubOntology {
    fn known(term: &str) -> bool {
        term == "biolink:NamedThing"
            || term == "biolink:related_to"
            || HIERARCHY.iter().any(|(child, _)| *child == term)
    }
}

impl OntologyService for StubOntology {
    fn is_predicate(&self, term: &str) -> bool {
        Self::known(term)
            && term
                .strip_prefix("biolink:")
                .is_some_and(|name| name.starts_with(|c: char| c.is_ascii_lowercase()))
    }

    fn descendants(&self, term: &str) -> Vec<String> {
        if !Self::known(term) {
            return Vec::new();
        }
        let mut out = vec![term.to_string()];
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for (child, parent) in HIERARCHY {
                if *parent == current {
                    out.push(child.to_string());
                }
            }
            i += 1;
        }
        out
    }

    fn ancestors(&self, term: &str) -> Vec<String> {
        if !Self::known(term) {
            return Vec::new();
        }
        let mut out = vec![term.to_string()];
        let mut current = term;
        while let Some((_, parent)) = HIERARCHY.iter().find(|(child, _)| *child == current) {
            out.push(parent.to_string());
            current = parent;
        }
        out
    }

    fn normalize(&self, term: &str) -> String {
        if term.starts_with("biolink:") {
            term.to_string()
        } else {
            format!("biolink:{term}")
        }
    }
}

fn concept(id: i64, name: &str, domain: &str, class: Option<&str>) -> ConceptDetail {
    ConceptDetail {
        concept_id: id,
        concept_name: name.to_string(),
        domain_id: domain.to_string(),
        concept_class_id: class.map(str::to_string),
    }
}

pub fn obs_exp(partner: i64, ln_ratio: f64, observed: u64) -> AssociationRecord {
    AssociationRecord {
        concept_id_1: BLADDER_CANCER,
        concept_id_2: partner,
        dataset_id: Some(3),
        ln_ratio: Some(ln_ratio),
        confidence_interval: Some([ln_ratio - 0.2, ln_ratio + 0.2]),
        observed_count: Some(observed),
        expected_count: Some(observed as f64 / ln_ratio.exp()),
        ..Default::default()
    }
}

fn omop(id: i64, name: &str, distance: u32) -> OmopMapping {
    OmopMapping {
        omop_concept_id: id,
        omop_concept_name: name.to_string(),
        distance,
    }
}

fn biolink(curie: &str, label: &str) -> BiolinkMapping {
    BiolinkMapping {
        target_curie: curie.to_string(),
        target_label: label.to_string(),
        distance: 1,
    }
}

/// Bladder cancer and its partners. Only the two ingredients and the
/// diabetes condition have Biolink mappings.
pub fn fixture() -> Fixture {
    let mut fixture = Fixture {
        concepts: vec![
            concept(BLADDER_CANCER, "Cancer in situ of urinary bladder", "Condition", Some("Clinical Finding")),
            concept(DICLOFENAC, "Diclofenac", "Drug", Some("Ingredient")),
            concept(DICLOFENAC_TABLET, "Diclofenac 50 MG Oral Tablet", "Drug", Some("Clinical Drug")),
            concept(CELECOXIB, "Celecoxib", "Drug", Some("Ingredient")),
            concept(CELECOXIB_CAPSULE, "Celecoxib 200 MG Oral Capsule", "Drug", Some("Clinical Drug")),
            concept(CYSTOSCOPY, "Cystoscopy", "Procedure", Some("Procedure")),
            concept(TYPE_2_DIABETES, "Type 2 diabetes mellitus", "Condition", Some("Clinical Finding")),
        ],
        ..Default::default()
    };

    let mut records = vec![
        obs_exp(DICLOFENAC, 2.1, 420),
        obs_exp(DICLOFENAC_TABLET, 1.5, 50),
        obs_exp(CELECOXIB, 0.9, 150),
        obs_exp(CYSTOSCOPY, 3.0, 900),
        obs_exp(TYPE_2_DIABETES, -0.5, 300),
        obs_exp(CELECOXIB_CAPSULE, 0.05, 200),
    ];
    // Straddles zero: never passes the confidence criterion.
    records[5].confidence_interval = Some([-0.1, 0.2]);
    for record in records {
        fixture.associations.push(cohd_trapi::memory::FixtureAssociation {
            method: Method::ObsExpRatio,
            record,
        });
    }

    fixture.curie_to_omop.insert(
        "DOID:9053".into(),
        omop(BLADDER_CANCER, "Cancer in situ of urinary bladder", 2),
    );
    fixture
        .curie_to_omop
        .insert("CHEBI:47381".into(), omop(DICLOFENAC, "Diclofenac", 1));
    fixture
        .omop_to_biolink
        .insert(DICLOFENAC, biolink("CHEBI:47381", "diclofenac"));
    fixture
        .omop_to_biolink
        .insert(CELECOXIB, biolink("CHEBI:41423", "celecoxib"));
    fixture
        .omop_to_biolink
        .insert(TYPE_2_DIABETES, biolink("MONDO:0005148", "type 2 diabetes mellitus"));
    fixture
}

/// One interpreter's worth of collaborators.
pub struct Harness {
    pub statistics: InMemoryStatistics,
    pub mapper: InMemoryConceptMapper,
    pub config: ServiceConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::from_fixture(&fixture())
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        Self {
            statistics: InMemoryStatistics::from_fixture(fixture),
            mapper: InMemoryConceptMapper::from_fixture(fixture),
            config: ServiceConfig::default(),
        }
    }

    pub fn run(&self, body: Value) -> Result<Outcome, QueryError> {
        let interpreter = QueryInterpreter::new(
            Collaborators {
                validator: &TrapiShapeValidator,
                mapper: &self.mapper,
                ontology: &StubOntology,
                statistics: &self.statistics,
            },
            &self.config,
        );
        interpreter.execute(body)
    }
}

/// `n00 --correlated_with--> n01` with the given qnode bodies and options.
pub fn one_hop(subject: Value, object: Value, options: Value) -> Value {
    json!({
        "message": {
            "query_graph": {
                "nodes": { "n00": subject, "n01": object },
                "edges": {
                    "e00": { "subject": "n00", "object": "n01", "predicates": ["biolink:correlated_with"] }
                }
            }
        },
        "query_options": options
    })
}

pub fn bladder_cancer() -> Value {
    json!({ "ids": ["DOID:9053"], "categories": ["biolink:DiseaseOrPhenotypicFeature"] })
}
