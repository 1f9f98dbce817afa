//! TRAPI wire types: the inbound query graph and the outbound knowledge
//! graph, result bindings and response envelope.
//!
//! Unknown fields on query nodes/edges are kept in `extra` so the query graph
//! echoed back in the response is the caller's own graph, plus our
//! annotations.

use crate::collaborators::OmopMapping;
use crate::context::LogEntry;
use crate::options::QueryOptions;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Inbound query
// ============================================================================

/// TRAPI allows a bare string wherever a list of CURIEs/categories is
/// expected; normalize to a list on the way in.
fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub ids: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<Value>>,
    /// Set on the echoed query graph once an identifier of this node mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_omop_concept: Option<OmopMapping>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl QueryNode {
    /// A node is anchored when it names at least one concrete identifier.
    pub fn is_anchored(&self) -> bool {
        self.ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }

    pub fn has_constraints(&self) -> bool {
        self.constraints.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn ids(&self) -> &[String] {
        self.ids.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEdge {
    pub subject: String,
    pub object: String,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub predicates: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: BTreeMap<String, QueryNode>,
    #[serde(default)]
    pub edges: BTreeMap<String, QueryEdge>,
}

impl QueryGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub query_graph: Option<QueryGraph>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Top-level request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub message: Message,
    #[serde(default)]
    pub query_options: Option<Map<String, Value>>,
    #[serde(default)]
    pub log_level: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ============================================================================
// Outbound knowledge graph
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_attribute_name: Option<String>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_url: Option<String>,
}

impl Attribute {
    pub fn new(attribute_type_id: &str, original_name: &str, value: Value) -> Self {
        Self {
            attribute_type_id: attribute_type_id.to_string(),
            original_attribute_name: Some(original_name.to_string()),
            value,
            value_type_id: None,
            attribute_source: None,
            value_url: None,
        }
    }

    pub fn value_type(mut self, value_type_id: &str) -> Self {
        self.value_type_id = Some(value_type_id.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.attribute_source = Some(source.to_string());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.value_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub categories: Vec<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub predicate: String,
    pub subject: String,
    pub object: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Keyed by the node's primary CURIE.
    pub nodes: BTreeMap<String, GraphNode>,
    /// Keyed by minted edge id (`ke000000`, ...).
    pub edges: BTreeMap<String, GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub node_bindings: BTreeMap<String, Vec<Binding>>,
    pub edge_bindings: BTreeMap<String, Vec<Binding>>,
}

impl QueryResult {
    /// Node ids bound by this result, in qnode-key order.
    pub fn bound_node_ids(&self) -> impl Iterator<Item = &str> {
        self.node_bindings
            .values()
            .flatten()
            .map(|b| b.id.as_str())
    }

    pub fn bound_edge_ids(&self) -> impl Iterator<Item = &str> {
        self.edge_bindings
            .values()
            .flatten()
            .map(|b| b.id.as_str())
    }
}

// ============================================================================
// Response envelope
// ============================================================================

/// TRAPI-level status. Only `Success` and `NoResults` come with a knowledge
/// graph; the other two are soft outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    NoResults,
    CouldNotMapCurieToLocalKG,
    UnsupportedQNodeCategory,
}

impl OutcomeStatus {
    pub fn is_soft_failure(self) -> bool {
        matches!(
            self,
            OutcomeStatus::CouldNotMapCurieToLocalKG | OutcomeStatus::UnsupportedQNodeCategory
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub results: Option<Vec<QueryResult>>,
    pub query_graph: Option<QueryGraph>,
    pub knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub status: OutcomeStatus,
    pub description: String,
    pub message: ResponseMessage,
    pub reasoner_id: String,
    pub tool_version: String,
    pub schema_version: String,
    pub datetime: String,
    pub query_options: Option<QueryOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}
