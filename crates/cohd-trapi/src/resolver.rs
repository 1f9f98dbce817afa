//! Query-node resolution into the OMOP concept space.
//!
//! The anchor qnode must resolve to a single concept. The other qnode
//! resolves to a concept (when it carries ids), to a set of (domain, class)
//! pairs (when it carries only categories), or to "anything".
//!
//! Failing to resolve is a soft outcome, not an error: the query was valid
//! but COHD has nothing to say about it.

use crate::biolink::{self, DomainClass, NAMED_THING, SUPPORTED_CATEGORIES};
use crate::collaborators::{ConceptId, ConceptMapper, MapperOptions, OmopMapping, OntologyService};
use crate::context::{LogLevel, QueryExecutionContext};
use crate::error::CollaboratorError;
use crate::model::{OutcomeStatus, QueryGraph, QueryNode};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAnchor {
    pub qnode_key: String,
    /// The first of the qnode's ids that mapped.
    pub curie: String,
    pub mapping: OmopMapping,
    pub categories: Option<Vec<String>>,
}

impl ResolvedAnchor {
    pub fn concept_id(&self) -> ConceptId {
        self.mapping.omop_concept_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Concept { curie: String, mapping: OmopMapping },
    DomainClasses(BTreeSet<DomainClass>),
    Unrestricted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub anchor: ResolvedAnchor,
    pub target_qnode_key: String,
    pub target: ResolvedTarget,
    pub target_categories: Option<Vec<String>>,
}

impl Resolution {
    pub fn target_curie(&self) -> Option<&str> {
        match &self.target {
            ResolvedTarget::Concept { curie, .. } => Some(curie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(Resolution),
    Unanswerable {
        status: OutcomeStatus,
        description: String,
    },
}

pub struct ConceptResolver<'a> {
    mapper: &'a dyn ConceptMapper,
    ontology: &'a dyn OntologyService,
    mapper_options: MapperOptions,
}

impl<'a> ConceptResolver<'a> {
    pub fn new(
        mapper: &'a dyn ConceptMapper,
        ontology: &'a dyn OntologyService,
        mapper_options: MapperOptions,
    ) -> Self {
        Self {
            mapper,
            ontology,
            mapper_options,
        }
    }

    /// Resolve both qnodes. The query graph is annotated in place with the
    /// chosen mappings and the normalized category lists.
    pub fn resolve(
        &self,
        ctx: &mut QueryExecutionContext,
        query_graph: &mut QueryGraph,
        anchor_key: &str,
        target_key: &str,
    ) -> Result<ResolutionOutcome, CollaboratorError> {
        let curies: Vec<String> = query_graph
            .nodes
            .values()
            .flat_map(|node| node.ids().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mappings = self.mapper.map_to_omop(&curies, &self.mapper_options)?;

        let Some(anchor_node) = query_graph.nodes.get_mut(anchor_key) else {
            return Ok(could_not_map(ctx, anchor_key));
        };
        let Some((curie, mapping)) = first_mapped(anchor_node, &mappings) else {
            return Ok(could_not_map(ctx, anchor_key));
        };
        ctx.info(format!(
            "{curie} mapped to OMOP concept ID {}",
            mapping.omop_concept_id
        ));
        anchor_node.mapped_omop_concept = Some(mapping.clone());
        let anchor_categories = self.normalize_node_categories(anchor_node);
        let anchor = ResolvedAnchor {
            qnode_key: anchor_key.to_string(),
            curie,
            mapping,
            categories: anchor_categories,
        };

        let Some(target_node) = query_graph.nodes.get_mut(target_key) else {
            return Ok(could_not_map(ctx, target_key));
        };
        let target_categories = self.normalize_node_categories(target_node);

        let target = if target_node.is_anchored() {
            let Some((curie, mapping)) = first_mapped(target_node, &mappings) else {
                return Ok(could_not_map(ctx, target_key));
            };
            ctx.info(format!(
                "{curie} mapped to OMOP concept ID {}",
                mapping.omop_concept_id
            ));
            target_node.mapped_omop_concept = Some(mapping.clone());
            ResolvedTarget::Concept { curie, mapping }
        } else {
            match target_categories.as_deref() {
                Some(categories) if !categories.is_empty() => {
                    if categories.iter().any(|c| c == NAMED_THING) {
                        ctx.info("Querying associations to all OMOP domains");
                        ResolvedTarget::Unrestricted
                    } else {
                        let pairs = self.domain_classes(categories);
                        if pairs.is_empty() {
                            let description = format!(
                                "None of QNode {target_key}'s categories ({}) are supported by COHD",
                                categories.join(", ")
                            );
                            ctx.log(
                                LogLevel::Warning,
                                Some(OutcomeStatus::UnsupportedQNodeCategory),
                                description.clone(),
                            );
                            return Ok(ResolutionOutcome::Unanswerable {
                                status: OutcomeStatus::UnsupportedQNodeCategory,
                                description,
                            });
                        }
                        for pair in &pairs {
                            ctx.info(format!("Querying associations to all OMOP domain {pair}"));
                        }
                        ResolvedTarget::DomainClasses(pairs)
                    }
                }
                _ => ResolvedTarget::Unrestricted,
            }
        };

        Ok(ResolutionOutcome::Resolved(Resolution {
            anchor,
            target_qnode_key: target_key.to_string(),
            target,
            target_categories,
        }))
    }

    /// Fix vocabulary spelling, then swap in preferred categories.
    pub fn normalize_categories(&self, categories: &[String]) -> Vec<String> {
        let mut out: Vec<String> = categories
            .iter()
            .map(|c| self.ontology.normalize(c))
            .collect();
        for i in 0..out.len() {
            if let Some(preferred) = self.mapper.suggest_category(&out[i]) {
                if !out.contains(&preferred) {
                    out[i] = preferred;
                }
            }
        }
        out
    }

    /// Union over supported categories of their (domain, class) pairs, for
    /// every supported category at or below one of the queried ones.
    pub fn domain_classes(&self, categories: &[String]) -> BTreeSet<DomainClass> {
        let closures: Vec<Vec<String>> = categories
            .iter()
            .map(|c| self.ontology.descendants(c))
            .collect();
        SUPPORTED_CATEGORIES
            .iter()
            .filter(|supported| {
                closures
                    .iter()
                    .any(|closure| closure.iter().any(|d| d == *supported))
            })
            .flat_map(|supported| biolink::domain_classes_for(supported))
            .collect()
    }

    fn normalize_node_categories(&self, node: &mut QueryNode) -> Option<Vec<String>> {
        let categories = node.categories.as_deref()?;
        let normalized = self.normalize_categories(categories);
        node.categories = Some(normalized.clone());
        Some(normalized)
    }
}

fn first_mapped(
    node: &QueryNode,
    mappings: &BTreeMap<String, Option<OmopMapping>>,
) -> Option<(String, OmopMapping)> {
    node.ids().iter().find_map(|curie| {
        mappings
            .get(curie)
            .and_then(Option::as_ref)
            .map(|m| (curie.clone(), m.clone()))
    })
}

fn could_not_map(ctx: &mut QueryExecutionContext, qnode_key: &str) -> ResolutionOutcome {
    let description = format!("Could not map node {qnode_key} to OMOP concept");
    ctx.log(
        LogLevel::Warning,
        Some(OutcomeStatus::CouldNotMapCurieToLocalKG),
        description.clone(),
    );
    ResolutionOutcome::Unanswerable {
        status: OutcomeStatus::CouldNotMapCurieToLocalKG,
        description,
    }
}
