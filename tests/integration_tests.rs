//! Integration tests across the COHD crates
//!
//! These tests run the full pipeline with the real components wired together:
//! - `BiolinkOntology` (built-in or loaded from a hierarchy document)
//! - fixture-backed statistics and concept mapping
//! - the TRAPI shape validator
//!
//! Run with: cargo test --test integration_tests

use cohd_ontology::BiolinkOntology;
use cohd_trapi::{
    Collaborators, Fixture, InMemoryConceptMapper, InMemoryStatistics, Outcome, OutcomeStatus,
    QueryError, QueryInterpreter, RejectionCode, ServiceConfig, TrapiShapeValidator,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::tempdir;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("crates/cohd-trapi-cli/fixtures")
}

fn load_fixture() -> Fixture {
    Fixture::from_path(&fixtures_dir().join("bladder_cancer.json")).unwrap()
}

fn run_with(ontology: &BiolinkOntology, body: &[u8]) -> Result<Outcome, QueryError> {
    let fixture = load_fixture();
    let statistics = InMemoryStatistics::from_fixture(&fixture);
    let mapper = InMemoryConceptMapper::from_fixture(&fixture);
    let config = ServiceConfig::default();
    let interpreter = QueryInterpreter::new(
        Collaborators {
            validator: &TrapiShapeValidator,
            mapper: &mapper,
            ontology,
            statistics: &statistics,
        },
        &config,
    );
    interpreter.execute_slice(body)
}

fn run(body: Value) -> Result<Outcome, QueryError> {
    run_with(&BiolinkOntology::builtin(), body.to_string().as_bytes())
}

fn query(target: Value, predicate: &str, options: Value) -> Value {
    json!({
        "message": {
            "query_graph": {
                "nodes": {
                    "n00": { "ids": ["DOID:9053"] },
                    "n01": target
                },
                "edges": {
                    "e00": { "subject": "n00", "object": "n01", "predicates": [predicate] }
                }
            }
        },
        "query_options": options
    })
}

fn bound_targets(outcome: &Outcome) -> Vec<String> {
    outcome
        .results()
        .iter()
        .map(|r| r.node_bindings["n01"][0].id.clone())
        .collect()
}

// ============================================================================
// Sample query shipped with the CLI
// ============================================================================

#[test]
fn test_sample_query_end_to_end() {
    let body = std::fs::read(fixtures_dir().join("query.json")).unwrap();
    let outcome = run_with(&BiolinkOntology::builtin(), &body).unwrap();

    assert_eq!(outcome.status(), OutcomeStatus::Success);
    assert_eq!(
        bound_targets(&outcome),
        vec!["CHEBI:47381", "CHEBI:47381", "CHEBI:41423", "CHEBI:41423"]
    );

    let json = outcome.to_json().unwrap();
    assert_eq!(json["status"], "Success");
    assert_eq!(json["description"], "COHD returned 4 results.");
    assert!(json["datetime"].is_string());
    assert!(json["logs"].as_array().is_some_and(|logs| !logs.is_empty()));

    // The anchor category was widened on its way through.
    assert_eq!(
        json["message"]["query_graph"]["nodes"]["n00"]["categories"],
        json!(["biolink:DiseaseOrPhenotypicFeature"])
    );
    let edges = json["message"]["knowledge_graph"]["edges"].as_object().unwrap();
    assert_eq!(edges.len(), 4);
    for edge in edges.values() {
        assert_eq!(edge["subject"], "DOID:9053");
        assert_eq!(edge["predicate"], "biolink:correlated_with");
    }
}

// ============================================================================
// Vocabulary handling with the built-in hierarchy
// ============================================================================

#[test]
fn test_loose_category_spelling_is_normalized() {
    let outcome = run(query(
        json!({ "categories": ["chemical_substance"] }),
        "biolink:correlated_with",
        json!({}),
    ))
    .unwrap();

    assert_eq!(outcome.status(), OutcomeStatus::Success);
    let echoed = outcome.query_graph().unwrap();
    assert_eq!(
        echoed.nodes["n01"].categories,
        Some(vec!["biolink:ChemicalSubstance".to_string()])
    );
    assert_eq!(outcome.results().len(), 4);
}

#[test]
fn test_ancestor_predicate_is_accepted() {
    let outcome = run(query(
        json!({ "categories": ["biolink:Procedure"] }),
        "related_to",
        json!({ "biolink_only": false }),
    ))
    .unwrap();

    assert_eq!(bound_targets(&outcome), vec!["OMOP:4324693"]);
    let echoed = outcome.query_graph().unwrap();
    assert_eq!(
        echoed.edges["e00"].predicates,
        Some(vec!["biolink:related_to".to_string()])
    );
}

#[test]
fn test_unrelated_predicate_is_rejected() {
    let err = run(query(json!({}), "biolink:treats", json!({}))).unwrap_err();
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.code, RejectionCode::UnsupportedPredicate);

    let body = rejection.to_json();
    assert_eq!(body["status"], 400);
    assert!(body["detail"].as_str().unwrap().contains("biolink:treats"));
}

#[test]
fn test_unknown_predicate_is_rejected() {
    let err = run(query(json!({}), "biolink:frobnicates", json!({}))).unwrap_err();
    assert_eq!(err.rejection().unwrap().code, RejectionCode::UnknownPredicate);
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_chi_square_records_carry_p_value() {
    let outcome = run(query(
        json!({}),
        "biolink:correlated_with",
        json!({ "method": "chiSquare", "biolink_only": false }),
    ))
    .unwrap();

    assert_eq!(bound_targets(&outcome), vec!["OMOP:4324693"]);
    let kg = outcome.knowledge_graph().unwrap();
    let edge = &kg.edges["ke000000"];
    assert!(edge
        .attributes
        .iter()
        .any(|a| a.original_attribute_name.as_deref() == Some("p-value")));
}

#[test]
fn test_relative_frequency_skips_confidence_filter() {
    let outcome = run(query(
        json!({}),
        "biolink:correlated_with",
        json!({ "method": "relativeFrequency" }),
    ))
    .unwrap();
    assert_eq!(bound_targets(&outcome), vec!["CHEBI:47381"]);
}

// ============================================================================
// Hierarchy documents
// ============================================================================

#[test]
fn test_custom_hierarchy_limits_answerable_categories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hierarchy.json");
    std::fs::write(
        &path,
        r#"{
            "classes": {
                "NamedThing": [],
                "DiseaseOrPhenotypicFeature": ["NamedThing"],
                "Procedure": ["NamedThing"]
            },
            "predicates": {
                "related_to": [],
                "correlated_with": ["related_to"]
            }
        }"#,
    )
    .unwrap();
    let ontology = BiolinkOntology::from_path(&path).unwrap();

    let chemical = query(
        json!({ "categories": ["biolink:ChemicalSubstance"] }),
        "biolink:correlated_with",
        json!({}),
    );
    let outcome = run_with(&ontology, chemical.to_string().as_bytes()).unwrap();
    assert_eq!(outcome.status(), OutcomeStatus::UnsupportedQNodeCategory);
    assert_eq!(outcome.http_status(), 200);

    let procedure = query(
        json!({ "categories": ["procedure"] }),
        "correlated_with",
        json!({ "biolink_only": false }),
    );
    let outcome = run_with(&ontology, procedure.to_string().as_bytes()).unwrap();
    assert_eq!(bound_targets(&outcome), vec!["OMOP:4324693"]);
}

// ============================================================================
// Malformed requests
// ============================================================================

#[test]
fn test_malformed_bodies_are_rejected() {
    let ontology = BiolinkOntology::builtin();

    let err = run_with(&ontology, b"{ not json").unwrap_err();
    assert_eq!(err.rejection().unwrap().code, RejectionCode::NotJson);

    let err = run_with(&ontology, br#"{ "message": 7 }"#).unwrap_err();
    assert_eq!(err.rejection().unwrap().code, RejectionCode::SchemaValidation);

    let err = run_with(&ontology, br#"{ "message": {} }"#).unwrap_err();
    assert_eq!(err.rejection().unwrap().code, RejectionCode::MissingQueryGraph);
}
