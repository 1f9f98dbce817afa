//! Result bindings and the response envelope.

use crate::config::ServiceConfig;
use crate::context::QueryExecutionContext;
use crate::kgraph::AcceptedEdge;
use crate::model::{
    Binding, Envelope, KnowledgeGraph, OutcomeStatus, QueryGraph, QueryResult, ResponseMessage,
};
use crate::options::QueryOptions;
use crate::resolver::Resolution;
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns accepted edges into result bindings and enforces the result cap.
pub struct ResultAssembler<'a> {
    anchor_key: &'a str,
    target_key: &'a str,
    edge_key: &'a str,
    max_results: usize,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(resolution: &'a Resolution, edge_key: &'a str, max_results: usize) -> Self {
        Self {
            anchor_key: &resolution.anchor.qnode_key,
            target_key: &resolution.target_qnode_key,
            edge_key,
            max_results,
        }
    }

    /// Append one result. Returns `true` once the cap is reached; the caller
    /// must stop feeding records at that point.
    pub fn push(&self, ctx: &mut QueryExecutionContext, edge: &AcceptedEdge) -> bool {
        let node_bindings = BTreeMap::from([
            (self.anchor_key.to_string(), vec![binding(&edge.anchor_curie)]),
            (self.target_key.to_string(), vec![binding(&edge.target_curie)]),
        ]);
        let edge_bindings = BTreeMap::from([(self.edge_key.to_string(), vec![binding(&edge.edge_id)])]);
        ctx.results.push(QueryResult {
            node_bindings,
            edge_bindings,
        });
        self.is_full(ctx)
    }

    pub fn is_full(&self, ctx: &QueryExecutionContext) -> bool {
        ctx.results.len() >= self.max_results
    }
}

fn binding(id: &str) -> Binding {
    Binding { id: id.to_string() }
}

/// The answer to one query: success, no results, or a soft outcome. Hard
/// rejections never produce one.
#[derive(Debug, Clone)]
pub struct Outcome {
    envelope: Envelope,
}

impl Outcome {
    /// Success or no-results envelope built from the request's accumulated
    /// graph, results and logs.
    pub fn finalize(
        ctx: &mut QueryExecutionContext,
        query_graph: QueryGraph,
        options: QueryOptions,
        config: &ServiceConfig,
    ) -> Self {
        let (knowledge_graph, results) = ctx.take_graph();
        let status = if results.is_empty() {
            OutcomeStatus::NoResults
        } else {
            OutcomeStatus::Success
        };
        let description = format!("COHD returned {} results.", results.len());
        tracing::info!(
            status = ?status,
            results = results.len(),
            nodes = knowledge_graph.nodes.len(),
            edges = knowledge_graph.edges.len(),
            "query finished"
        );
        let message = ResponseMessage {
            results: Some(results),
            query_graph: Some(query_graph),
            knowledge_graph: Some(knowledge_graph),
        };
        Self::build(ctx, status, description, message, Some(options), config)
    }

    /// Valid but unanswerable query: no results and no knowledge graph.
    pub fn unanswerable(
        ctx: &mut QueryExecutionContext,
        status: OutcomeStatus,
        description: String,
        query_graph: Option<QueryGraph>,
        options: Option<QueryOptions>,
        config: &ServiceConfig,
    ) -> Self {
        tracing::info!(status = ?status, %description, "query unanswerable");
        let message = ResponseMessage {
            results: None,
            query_graph,
            knowledge_graph: None,
        };
        Self::build(ctx, status, description, message, options, config)
    }

    fn build(
        ctx: &mut QueryExecutionContext,
        status: OutcomeStatus,
        description: String,
        message: ResponseMessage,
        query_options: Option<QueryOptions>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            envelope: Envelope {
                status,
                description,
                message,
                reasoner_id: config.reasoner_id.clone(),
                tool_version: config.tool_version.clone(),
                schema_version: config.schema_version.clone(),
                datetime: Local::now().format(DATETIME_FORMAT).to_string(),
                query_options,
                logs: ctx.take_logs(),
            },
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        self.envelope.status
    }

    pub fn description(&self) -> &str {
        &self.envelope.description
    }

    pub fn results(&self) -> &[QueryResult] {
        self.envelope.message.results.as_deref().unwrap_or(&[])
    }

    pub fn knowledge_graph(&self) -> Option<&KnowledgeGraph> {
        self.envelope.message.knowledge_graph.as_ref()
    }

    pub fn query_graph(&self) -> Option<&QueryGraph> {
        self.envelope.message.query_graph.as_ref()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }

    /// Soft outcomes are still well-formed TRAPI responses.
    pub fn http_status(&self) -> u16 {
        200
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(&self.envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::OmopMapping;
    use crate::context::LogLevel;
    use crate::resolver::{ResolvedAnchor, ResolvedTarget};

    fn resolution() -> Resolution {
        Resolution {
            anchor: ResolvedAnchor {
                qnode_key: "n00".into(),
                curie: "DOID:9053".into(),
                mapping: OmopMapping {
                    omop_concept_id: 192855,
                    omop_concept_name: "Cancer in situ of urinary bladder".into(),
                    distance: 2,
                },
                categories: None,
            },
            target_qnode_key: "n01".into(),
            target: ResolvedTarget::Unrestricted,
            target_categories: None,
        }
    }

    fn accepted(i: usize) -> AcceptedEdge {
        AcceptedEdge {
            edge_id: format!("ke{i:06}"),
            anchor_curie: "DOID:9053".into(),
            target_curie: format!("OMOP:{i}"),
        }
    }

    #[test]
    fn push_binds_qnode_and_edge_keys() {
        let resolution = resolution();
        let assembler = ResultAssembler::new(&resolution, "e00", 10);
        let mut ctx = QueryExecutionContext::new(LogLevel::Warning);

        assert!(!assembler.push(&mut ctx, &accepted(0)));
        let result = &ctx.results()[0];
        assert_eq!(result.node_bindings["n00"][0].id, "DOID:9053");
        assert_eq!(result.node_bindings["n01"][0].id, "OMOP:0");
        assert_eq!(result.edge_bindings["e00"][0].id, "ke000000");
    }

    #[test]
    fn push_reports_cap() {
        let resolution = resolution();
        let assembler = ResultAssembler::new(&resolution, "e00", 2);
        let mut ctx = QueryExecutionContext::new(LogLevel::Warning);

        assert!(!assembler.push(&mut ctx, &accepted(0)));
        assert!(assembler.push(&mut ctx, &accepted(1)));
    }

    #[test]
    fn empty_results_finalize_as_no_results() {
        let config = ServiceConfig::default();
        let mut ctx = QueryExecutionContext::new(LogLevel::Warning);
        let outcome = Outcome::finalize(
            &mut ctx,
            QueryGraph::default(),
            QueryOptions::defaults(&config),
            &config,
        );
        assert_eq!(outcome.status(), OutcomeStatus::NoResults);
        assert_eq!(outcome.description(), "COHD returned 0 results.");
        assert!(outcome.knowledge_graph().is_some());

        let json = outcome.to_json().unwrap();
        assert_eq!(json["status"], "NoResults");
        assert_eq!(json["message"]["results"], serde_json::json!([]));
        assert!(json.get("logs").is_none());
        assert_eq!(json["datetime"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn unanswerable_nulls_results_and_graph() {
        let config = ServiceConfig::default();
        let mut ctx = QueryExecutionContext::new(LogLevel::Warning);
        ctx.log(
            LogLevel::Warning,
            Some(OutcomeStatus::CouldNotMapCurieToLocalKG),
            "Could not map node n00 to OMOP concept",
        );
        let outcome = Outcome::unanswerable(
            &mut ctx,
            OutcomeStatus::CouldNotMapCurieToLocalKG,
            "Could not map node n00 to OMOP concept".into(),
            Some(QueryGraph::default()),
            None,
            &config,
        );
        assert_eq!(outcome.http_status(), 200);
        let json = outcome.to_json().unwrap();
        assert!(json["message"]["results"].is_null());
        assert!(json["message"]["knowledge_graph"].is_null());
        assert_eq!(json["reasoner_id"], "COHD");
        assert_eq!(json["logs"].as_array().unwrap().len(), 1);
        assert_eq!(json["logs"][0]["code"], "CouldNotMapCurieToLocalKG");
    }
}
