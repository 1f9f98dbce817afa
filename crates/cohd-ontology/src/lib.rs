//! Biolink hierarchy for COHD.
//!
//! A small, explicit slice of the Biolink model: the category tree above the
//! categories COHD answers for, and the predicate tree above
//! `biolink:correlated_with`. Deployments can replace it with a JSON
//! hierarchy document.
//!
//! ```text
//!   NamedThing ─┬─ BiologicalEntity ─┬─ DiseaseOrPhenotypicFeature ─┬─ Disease
//!               │                    │                              └─ PhenotypicFeature
//!               │                    ├─ MolecularEntity ── ChemicalSubstance ── Drug
//!               │                    └─ Gene
//!               └─ Procedure
//!
//!   related_to ─┬─ associated_with ── correlated_with ─┬─ positively_correlated_with
//!               │                                      └─ negatively_correlated_with
//!               ├─ interacts_with
//!               └─ treats
//! ```

use cohd_trapi::biolink::BIOLINK_PREFIX;
use cohd_trapi::OntologyService;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

const BUILTIN_CLASSES: &[(&str, &[&str])] = &[
    ("NamedThing", &[]),
    ("BiologicalEntity", &["NamedThing"]),
    ("DiseaseOrPhenotypicFeature", &["BiologicalEntity"]),
    ("Disease", &["DiseaseOrPhenotypicFeature"]),
    ("PhenotypicFeature", &["DiseaseOrPhenotypicFeature"]),
    ("MolecularEntity", &["BiologicalEntity"]),
    ("ChemicalSubstance", &["MolecularEntity"]),
    ("Drug", &["ChemicalSubstance"]),
    ("Gene", &["BiologicalEntity"]),
    ("Procedure", &["NamedThing"]),
];

const BUILTIN_PREDICATES: &[(&str, &[&str])] = &[
    ("related_to", &[]),
    ("associated_with", &["related_to"]),
    ("correlated_with", &["associated_with"]),
    ("positively_correlated_with", &["correlated_with"]),
    ("negatively_correlated_with", &["correlated_with"]),
    ("interacts_with", &["related_to"]),
    ("treats", &["related_to"]),
];

#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{term} names unknown parent {parent}")]
    UnknownParent { term: String, parent: String },
    #[error("hierarchy contains a cycle through {0}")]
    Cycle(String),
}

/// On-disk hierarchy: term → parent terms, for classes and predicates.
/// Terms may omit the `biolink:` prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyDocument {
    pub classes: BTreeMap<String, Vec<String>>,
    pub predicates: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct BiolinkOntology {
    parents: BTreeMap<String, Vec<String>>,
    children: BTreeMap<String, BTreeSet<String>>,
    predicates: BTreeSet<String>,
}

impl BiolinkOntology {
    /// The hierarchy COHD ships with.
    pub fn builtin() -> Self {
        let mut ontology = Self::default();
        for (term, parents) in BUILTIN_CLASSES {
            ontology.insert(prefixed(term), parents.iter().map(|p| prefixed(p)).collect(), false);
        }
        for (term, parents) in BUILTIN_PREDICATES {
            ontology.insert(prefixed(term), parents.iter().map(|p| prefixed(p)).collect(), true);
        }
        ontology
    }

    pub fn from_document(document: &HierarchyDocument) -> Result<Self, OntologyError> {
        let mut ontology = Self::default();
        for (entries, is_predicate) in [(&document.classes, false), (&document.predicates, true)] {
            for (term, parents) in entries {
                let parents = parents.iter().map(|p| prefixed(p)).collect();
                ontology.insert(prefixed(term), parents, is_predicate);
            }
        }
        ontology.check()?;
        tracing::debug!(
            terms = ontology.parents.len(),
            predicates = ontology.predicates.len(),
            "loaded Biolink hierarchy"
        );
        Ok(ontology)
    }

    pub fn from_json(text: &str) -> Result<Self, OntologyError> {
        Self::from_document(&serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, OntologyError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.parents.contains_key(term)
    }

    pub fn parents(&self, term: &str) -> &[String] {
        self.parents.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    fn insert(&mut self, term: String, parents: Vec<String>, is_predicate: bool) {
        for parent in &parents {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(term.clone());
        }
        if is_predicate {
            self.predicates.insert(term.clone());
        }
        self.parents.insert(term, parents);
    }

    /// Every parent must be a known term and the parent relation acyclic.
    fn check(&self) -> Result<(), OntologyError> {
        for (term, parents) in &self.parents {
            if let Some(parent) = parents.iter().find(|p| !self.contains(p)) {
                return Err(OntologyError::UnknownParent {
                    term: term.clone(),
                    parent: parent.clone(),
                });
            }
        }

        // Kahn's algorithm: anything left unvisited sits on a cycle.
        let mut pending: BTreeMap<&str, usize> = self
            .parents
            .iter()
            .map(|(term, parents)| (term.as_str(), parents.len()))
            .collect();
        let mut ready: VecDeque<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(term, _)| *term)
            .collect();
        while let Some(term) = ready.pop_front() {
            pending.remove(term);
            for child in self.children.get(term).into_iter().flatten() {
                if let Some(n) = pending.get_mut(child.as_str()) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(child.as_str());
                    }
                }
            }
        }
        match pending.keys().next() {
            Some(term) => Err(OntologyError::Cycle(term.to_string())),
            None => Ok(()),
        }
    }

    /// Breadth-first closure over `edges`, starting at (and including) `term`.
    fn closure<'a, I>(&'a self, term: &str, edges: impl Fn(&'a str) -> I) -> Vec<String>
    where
        I: Iterator<Item = &'a String>,
    {
        let Some((start, _)) = self.parents.get_key_value(term) else {
            return Vec::new();
        };
        let mut seen: BTreeSet<&str> = BTreeSet::from([start.as_str()]);
        let mut queue: VecDeque<&str> = VecDeque::from([start.as_str()]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            out.push(current.to_string());
            for next in edges(current) {
                if seen.insert(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }
        out
    }
}

impl OntologyService for BiolinkOntology {
    fn is_predicate(&self, term: &str) -> bool {
        self.predicates.contains(term)
    }

    fn descendants(&self, term: &str) -> Vec<String> {
        self.closure(term, |t| self.children.get(t).into_iter().flatten())
    }

    fn ancestors(&self, term: &str) -> Vec<String> {
        self.closure(term, |t| self.parents(t).iter())
    }

    fn normalize(&self, term: &str) -> String {
        let term = term.trim();
        if self.contains(term) {
            return term.to_string();
        }
        let name = term.strip_prefix(BIOLINK_PREFIX).unwrap_or(term);

        let class = prefixed(&upper_camel(name));
        if self.contains(&class) && !self.predicates.contains(&class) {
            return class;
        }
        let predicate = prefixed(&snake(name));
        if self.predicates.contains(&predicate) {
            return predicate;
        }

        if term.starts_with(BIOLINK_PREFIX) {
            term.to_string()
        } else {
            class
        }
    }
}

fn prefixed(term: &str) -> String {
    if term.starts_with(BIOLINK_PREFIX) {
        term.to_string()
    } else {
        format!("{BIOLINK_PREFIX}{term}")
    }
}

/// `chemical_substance`, `chemical substance`, `drug` → `ChemicalSubstance`,
/// `Drug`. Already-camel input is kept.
fn upper_camel(name: &str) -> String {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `CorrelatedWith`, `correlated with` → `correlated_with`.
fn snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_whitespace() || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_include_self_in_breadth_first_order() {
        let ontology = BiolinkOntology::builtin();
        assert_eq!(
            ontology.descendants("biolink:ChemicalSubstance"),
            vec!["biolink:ChemicalSubstance", "biolink:Drug"]
        );
        assert_eq!(
            ontology.descendants("biolink:DiseaseOrPhenotypicFeature"),
            vec![
                "biolink:DiseaseOrPhenotypicFeature",
                "biolink:Disease",
                "biolink:PhenotypicFeature"
            ]
        );
        assert!(ontology.descendants("biolink:Unknown").is_empty());
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let ontology = BiolinkOntology::builtin();
        assert_eq!(
            ontology.ancestors("biolink:Drug"),
            vec![
                "biolink:Drug",
                "biolink:ChemicalSubstance",
                "biolink:MolecularEntity",
                "biolink:BiologicalEntity",
                "biolink:NamedThing"
            ]
        );
    }

    #[test]
    fn predicates_are_separate_from_classes() {
        let ontology = BiolinkOntology::builtin();
        assert!(ontology.is_predicate("biolink:correlated_with"));
        assert!(ontology.is_predicate("biolink:related_to"));
        assert!(!ontology.is_predicate("biolink:Drug"));
        assert!(ontology
            .descendants("biolink:related_to")
            .contains(&"biolink:correlated_with".to_string()));
    }

    #[test]
    fn normalize_fixes_prefix_and_casing() {
        let ontology = BiolinkOntology::builtin();
        assert_eq!(ontology.normalize("drug"), "biolink:Drug");
        assert_eq!(ontology.normalize("chemical_substance"), "biolink:ChemicalSubstance");
        assert_eq!(
            ontology.normalize("biolink:disease_or_phenotypic_feature"),
            "biolink:DiseaseOrPhenotypicFeature"
        );
        assert_eq!(ontology.normalize("correlated_with"), "biolink:correlated_with");
        assert_eq!(ontology.normalize("biolink:CorrelatedWith"), "biolink:correlated_with");
        assert_eq!(ontology.normalize("biolink:frobnicates"), "biolink:frobnicates");
        assert_eq!(ontology.normalize("gadget"), "biolink:Gadget");
    }

    #[test]
    fn document_rejects_unknown_parent_and_cycles() {
        let unknown = r#"{ "classes": { "Drug": ["ChemicalSubstance"] } }"#;
        assert!(matches!(
            BiolinkOntology::from_json(unknown),
            Err(OntologyError::UnknownParent { .. })
        ));

        let cycle = r#"{ "classes": { "A": ["B"], "B": ["A"], "Root": [] } }"#;
        assert!(matches!(
            BiolinkOntology::from_json(cycle),
            Err(OntologyError::Cycle(_))
        ));
    }

    #[test]
    fn document_accepts_unprefixed_terms_and_mixins() {
        let ontology = BiolinkOntology::from_json(
            r#"{
                "classes": { "NamedThing": [], "Device": ["NamedThing"], "DrugDevice": ["Device", "NamedThing"] },
                "predicates": { "related_to": [] }
            }"#,
        )
        .unwrap();
        assert_eq!(
            ontology.ancestors("biolink:DrugDevice"),
            vec!["biolink:DrugDevice", "biolink:Device", "biolink:NamedThing"]
        );
        assert!(ontology.is_predicate("biolink:related_to"));
    }
}
