//! Knowledge-graph assembly.
//!
//! Concepts are resolved lazily the first time a record mentions them and
//! cached for the rest of the request (first-seen wins). A cached concept is
//! only copied into the knowledge graph once an edge using it is accepted,
//! so a concept seen only on rejected records never shows up in the output.

use crate::association::AssociationRecord;
use crate::biolink::{self, DEFAULT_PREDICATE};
use crate::collaborators::{ConceptId, ConceptMapper, MapperOptions, OntologyService, StatisticsStore};
use crate::context::QueryExecutionContext;
use crate::error::QueryError;
use crate::model::{Attribute, GraphEdge, GraphNode, QueryEdge};
use crate::resolver::Resolution;
use serde_json::Value;

const COHD_SOURCE: &str = "COHD";
const OMOP_SOURCE: &str = "OMOP";

/// A concept as this request knows it: identity, chosen external mapping and
/// compliance. The serialized [`GraphNode`] is derived from it on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConcept {
    pub concept_id: ConceptId,
    pub internal_id: String,
    pub name: String,
    pub domain_id: String,
    pub concept_class_id: Option<String>,
    pub category: String,
    pub primary_curie: String,
    pub primary_label: String,
    pub biolink_compliant: bool,
    pub in_kgraph: bool,
}

impl ResolvedConcept {
    pub fn graph_node(&self) -> GraphNode {
        let omop_curie = biolink::omop_curie(self.concept_id);
        GraphNode {
            name: self.primary_label.clone(),
            categories: vec![self.category.clone()],
            attributes: vec![
                Attribute::new("EDAM:data_1087", "concept_id", Value::from(omop_curie))
                    .value_type("EDAM:data_1087")
                    .source(OMOP_SOURCE)
                    .url(biolink::athena_url(self.concept_id)),
                Attribute::new("EDAM:data_2339", "concept_name", Value::from(self.name.clone()))
                    .value_type("EDAM:data_2339")
                    .source(OMOP_SOURCE),
                Attribute::new("EDAM:data_0967", "domain", Value::from(self.domain_id.clone()))
                    .value_type("EDAM:data_0967")
                    .source(OMOP_SOURCE),
            ],
        }
    }
}

/// Field → attribute descriptor for edge attributes. Absent fields are
/// skipped, never defaulted.
struct EdgeAttributeSpec {
    field: &'static str,
    attribute_type_id: &'static str,
    value_type_id: &'static str,
    value_url: Option<&'static str>,
    read: fn(&AssociationRecord) -> Option<Value>,
}

macro_rules! count_attribute {
    ($name:literal, $field:ident) => {
        EdgeAttributeSpec {
            field: $name,
            attribute_type_id: "biolink:has_count",
            value_type_id: "EDAM:data_0006",
            value_url: None,
            read: |r| r.$field.map(Value::from),
        }
    };
}

const EDGE_ATTRIBUTES: &[EdgeAttributeSpec] = &[
    EdgeAttributeSpec {
        field: "p-value",
        attribute_type_id: "biolink:p_value",
        value_type_id: "EDAM:data_1669",
        value_url: Some("http://edamontology.org/data_1669"),
        read: |r| r.p_value.map(Value::from),
    },
    EdgeAttributeSpec {
        field: "confidence_interval",
        attribute_type_id: "biolink:has_confidence_level",
        value_type_id: "EDAM:data_0951",
        value_url: None,
        read: |r| r.confidence_interval.map(|ci| Value::from(ci.to_vec())),
    },
    EdgeAttributeSpec {
        field: "dataset_id",
        attribute_type_id: "biolink:provided_by",
        value_type_id: "EDAM:data_1048",
        value_url: None,
        read: |r| r.dataset_id.map(Value::from),
    },
    EdgeAttributeSpec {
        field: "expected_count",
        attribute_type_id: "EDAM:operation_3438",
        value_type_id: "EDAM:operation_3438",
        value_url: None,
        read: |r| r.expected_count.map(Value::from),
    },
    EdgeAttributeSpec {
        field: "ln_ratio",
        attribute_type_id: "biolink:has_evidence",
        value_type_id: "EDAM:data_1772",
        value_url: None,
        read: |r| r.ln_ratio.map(Value::from),
    },
    EdgeAttributeSpec {
        field: "relative_frequency",
        attribute_type_id: "biolink:has_evidence",
        value_type_id: "EDAM:data_1772",
        value_url: None,
        read: |r| r.relative_frequency.map(Value::from),
    },
    count_attribute!("observed_count", observed_count),
    count_attribute!("concept_pair_count", concept_pair_count),
    count_attribute!("concept_2_count", concept_2_count),
    count_attribute!("n", n),
    count_attribute!("n_c1", n_c1),
    count_attribute!("n_c1_c2", n_c1_c2),
    count_attribute!("n_c1_~c2", n_c1_not_c2),
    count_attribute!("n_c2", n_c2),
    count_attribute!("n_~c1_c2", n_not_c1_c2),
    count_attribute!("n_~c1_~c2", n_not_c1_not_c2),
];

pub fn edge_attributes(record: &AssociationRecord) -> Vec<Attribute> {
    EDGE_ATTRIBUTES
        .iter()
        .filter_map(|spec| {
            let value = (spec.read)(record)?;
            let mut attribute = Attribute::new(spec.attribute_type_id, spec.field, value)
                .value_type(spec.value_type_id)
                .source(COHD_SOURCE);
            if let Some(url) = spec.value_url {
                attribute = attribute.url(url);
            }
            Some(attribute)
        })
        .collect()
}

/// Edge accepted into the knowledge graph, with the primary CURIEs of the
/// anchor-side and target-side nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEdge {
    pub edge_id: String,
    pub anchor_curie: String,
    pub target_curie: String,
}

pub struct KnowledgeGraphBuilder<'a> {
    mapper: &'a dyn ConceptMapper,
    ontology: &'a dyn OntologyService,
    statistics: &'a dyn StatisticsStore,
    mapper_options: MapperOptions,
    biolink_only: bool,
    resolution: &'a Resolution,
    query_edge: &'a QueryEdge,
}

impl<'a> KnowledgeGraphBuilder<'a> {
    pub fn new(
        mapper: &'a dyn ConceptMapper,
        ontology: &'a dyn OntologyService,
        statistics: &'a dyn StatisticsStore,
        resolution: &'a Resolution,
        query_edge: &'a QueryEdge,
    ) -> Self {
        Self {
            mapper,
            ontology,
            statistics,
            mapper_options: MapperOptions {
                local_oxo: true,
                distance: 3,
                ontology_targets: None,
            },
            biolink_only: false,
            resolution,
            query_edge,
        }
    }

    pub fn mapper_options(mut self, options: MapperOptions) -> Self {
        self.mapper_options = options;
        self
    }

    pub fn biolink_only(mut self, biolink_only: bool) -> Self {
        self.biolink_only = biolink_only;
        self
    }

    /// Add one accepted record. Returns `None` when the biolink-only policy
    /// drops it; in that case nothing is inserted into the graph.
    pub fn add_record(
        &self,
        ctx: &mut QueryExecutionContext,
        record: &AssociationRecord,
    ) -> Result<Option<AcceptedEdge>, QueryError> {
        let resolution = self.resolution;

        let anchor_compliant = self.ensure_concept(
            ctx,
            ConceptHints {
                concept_id: record.concept_id_1,
                name: None,
                domain_id: None,
                qnode_curie: Some(resolution.anchor.curie.as_str()),
                qnode_categories: resolution.anchor.categories.as_deref(),
            },
        )?;
        if self.biolink_only && !anchor_compliant {
            ctx.debug(format!(
                "Skipping OMOP:{}: no Biolink mapping",
                record.concept_id_1
            ));
            return Ok(None);
        }

        let target_compliant = self.ensure_concept(
            ctx,
            ConceptHints {
                concept_id: record.concept_id_2,
                name: record.concept_2_name.as_deref(),
                domain_id: record.concept_2_domain.as_deref(),
                qnode_curie: resolution.target_curie(),
                qnode_categories: resolution.target_categories.as_deref(),
            },
        )?;
        if self.biolink_only && !target_compliant {
            ctx.debug(format!(
                "Skipping OMOP:{}: no Biolink mapping",
                record.concept_id_2
            ));
            return Ok(None);
        }

        let anchor_curie = self.insert_node(ctx, record.concept_id_1)?;
        let target_curie = self.insert_node(ctx, record.concept_id_2)?;

        let (subject, object) = if self.query_edge.subject == resolution.anchor.qnode_key {
            (anchor_curie.clone(), target_curie.clone())
        } else if self.query_edge.subject == resolution.target_qnode_key {
            (target_curie.clone(), anchor_curie.clone())
        } else {
            return Err(QueryError::Invariant(format!(
                "query edge subject `{}` matches neither resolved qnode",
                self.query_edge.subject
            )));
        };

        let edge_id = format!("ke{:06}", ctx.knowledge_graph.edges.len());
        ctx.knowledge_graph.edges.insert(
            edge_id.clone(),
            GraphEdge {
                predicate: DEFAULT_PREDICATE.to_string(),
                subject,
                object,
                attributes: edge_attributes(record),
            },
        );

        Ok(Some(AcceptedEdge {
            edge_id,
            anchor_curie,
            target_curie,
        }))
    }

    /// Look up or create the cached concept; returns its compliance flag.
    fn ensure_concept(
        &self,
        ctx: &mut QueryExecutionContext,
        hints: ConceptHints<'_>,
    ) -> Result<bool, QueryError> {
        if let Some(existing) = ctx.concepts.get(&hints.concept_id) {
            return Ok(existing.biolink_compliant);
        }

        let mut name = hints.name.unwrap_or_default().to_string();
        let mut domain_id = hints.domain_id.unwrap_or_default().to_string();
        let mut concept_class_id = None;
        // Records never carry the concept class, so a new concept always
        // needs its definition.
        if let Some(detail) = self.statistics.concept_detail(hints.concept_id)? {
            if name.is_empty() {
                name = detail.concept_name;
            }
            if domain_id.is_empty() {
                domain_id = detail.domain_id;
            }
            concept_class_id = detail.concept_class_id;
        }

        let category = self.node_category(&domain_id, concept_class_id.as_deref(), hints.qnode_categories);
        let mapping = self
            .mapper
            .map_from_omop(hints.concept_id, &category, &self.mapper_options)?;

        let (primary_curie, primary_label, biolink_compliant) = match (hints.qnode_curie, mapping) {
            (Some(curie), mapping) => (
                curie.to_string(),
                mapping.map(|m| m.target_label).unwrap_or_else(|| name.clone()),
                true,
            ),
            (None, Some(mapping)) => (mapping.target_curie, mapping.target_label, true),
            (None, None) => (biolink::omop_curie(hints.concept_id), name.clone(), false),
        };

        let concept = ResolvedConcept {
            concept_id: hints.concept_id,
            internal_id: format!("{:06}", ctx.concepts.len()),
            name,
            domain_id,
            concept_class_id,
            category,
            primary_curie,
            primary_label,
            biolink_compliant,
            in_kgraph: false,
        };
        tracing::debug!(
            concept_id = concept.concept_id,
            internal_id = %concept.internal_id,
            curie = %concept.primary_curie,
            compliant = concept.biolink_compliant,
            "resolved concept"
        );
        ctx.concepts.insert(hints.concept_id, concept);
        Ok(biolink_compliant)
    }

    /// Copy a cached concept into the knowledge graph once; returns its
    /// primary CURIE.
    fn insert_node(
        &self,
        ctx: &mut QueryExecutionContext,
        concept_id: ConceptId,
    ) -> Result<String, QueryError> {
        let concept = ctx.concepts.get_mut(&concept_id).ok_or_else(|| {
            QueryError::Invariant(format!("concept {concept_id} inserted before resolution"))
        })?;
        let curie = concept.primary_curie.clone();
        if !concept.in_kgraph {
            concept.in_kgraph = true;
            let node = concept.graph_node();
            // Two concepts can share a primary CURIE; the first one keeps it.
            ctx.knowledge_graph.nodes.entry(curie.clone()).or_insert(node);
        }
        Ok(curie)
    }

    /// Biolink category for a new node: the domain's default category unless
    /// the qnode asked for categories that do not cover it.
    fn node_category(
        &self,
        domain_id: &str,
        concept_class_id: Option<&str>,
        qnode_categories: Option<&[String]>,
    ) -> String {
        let candidate = biolink::category_for_domain(domain_id, concept_class_id);
        let Some(requested) = qnode_categories.filter(|c| !c.is_empty()) else {
            return candidate.to_string();
        };
        let lineage = self.ontology.ancestors(candidate);
        if requested.iter().any(|c| lineage.contains(c)) {
            candidate.to_string()
        } else {
            requested[0].clone()
        }
    }
}

struct ConceptHints<'h> {
    concept_id: ConceptId,
    name: Option<&'h str>,
    domain_id: Option<&'h str>,
    qnode_curie: Option<&'h str>,
    qnode_categories: Option<&'h [String]>,
}
