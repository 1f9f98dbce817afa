//! Query orchestration.
//!
//! ```text
//!   body ──► prepare ──────────────────────────────► QueryPlan
//!             │ log_level, schema, shape, options,
//!             │ predicates, anchor, constraints
//!             ▼
//!   QueryPlan ──► ConceptResolver ──► AssociationRetriever
//!                       │ (soft outcome)        │
//!                       ▼                       ▼ for each record
//!                    Outcome          CriteriaFilter → KnowledgeGraphBuilder
//!                                                    → ResultAssembler (cap)
//!                                                    → Outcome
//! ```
//!
//! Every check in `prepare` runs before any collaborator lookup other than
//! schema validation and ontology closure, so a hard rejection never leaves a
//! partial knowledge graph behind.

use crate::association::AssociationRetriever;
use crate::biolink::SUPPORTED_PREDICATES;
use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::context::{LogLevel, QueryExecutionContext};
use crate::criteria::CriteriaFilter;
use crate::error::{CollaboratorError, QueryError, Rejection, RejectionCode};
use crate::kgraph::KnowledgeGraphBuilder;
use crate::model::{Query, QueryEdge, QueryGraph};
use crate::options::QueryOptions;
use crate::resolver::{ConceptResolver, ResolutionOutcome};
use crate::results::{Outcome, ResultAssembler};
use serde_json::Value;

/// A query that passed every hard check, ready to execute.
#[derive(Debug)]
pub struct QueryPlan {
    /// Echoed back in the response, with normalization and mapping
    /// annotations applied during execution.
    pub query_graph: QueryGraph,
    pub edge_key: String,
    pub edge: QueryEdge,
    pub anchor_key: String,
    pub target_key: String,
    pub options: QueryOptions,
    pub criteria: CriteriaFilter,
}

/// Runs one-hop queries against a fixed set of collaborators.
///
/// The interpreter itself holds no request state; each call gets a fresh
/// [`QueryExecutionContext`], so one instance can serve requests one after
/// another.
pub struct QueryInterpreter<'a> {
    collaborators: Collaborators<'a>,
    config: &'a ServiceConfig,
}

impl<'a> QueryInterpreter<'a> {
    pub fn new(collaborators: Collaborators<'a>, config: &'a ServiceConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// Execute a raw request body.
    pub fn execute_slice(&self, body: &[u8]) -> Result<Outcome, QueryError> {
        let body: Value = serde_json::from_slice(body).map_err(|e| {
            Rejection::new(
                RejectionCode::NotJson,
                format!("Request body is not valid JSON: {e}"),
            )
        })?;
        self.execute(body)
    }

    pub fn execute(&self, body: Value) -> Result<Outcome, QueryError> {
        let mut ctx = QueryExecutionContext::new(self.config.default_log_level);
        let plan = self.prepare(&mut ctx, body)?;
        self.run(&mut ctx, plan)
    }

    /// Run only the hard checks and option resolution.
    pub fn validate(&self, body: Value) -> Result<QueryPlan, QueryError> {
        let mut ctx = QueryExecutionContext::new(self.config.default_log_level);
        self.prepare(&mut ctx, body)
    }

    pub fn prepare(
        &self,
        ctx: &mut QueryExecutionContext,
        body: Value,
    ) -> Result<QueryPlan, QueryError> {
        if body.is_null() {
            return Err(reject(RejectionCode::MissingBody, "No query JSON provided").into());
        }

        // Read first so that validation messages honor the request's level.
        if let Some(level) = body.get("log_level").and_then(Value::as_str) {
            match level.parse::<LogLevel>() {
                Ok(level) => ctx.set_log_level(level),
                Err(e) => ctx.debug(format!("Ignoring log_level: {e}")),
            }
        }

        match self.collaborators.validator.validate(&body) {
            Ok(()) => {}
            Err(CollaboratorError::Schema(detail)) => {
                return Err(reject(
                    RejectionCode::SchemaValidation,
                    format!("Query did not pass TRAPI validation: {detail}"),
                )
                .into());
            }
            Err(other) => return Err(other.into()),
        }

        let query: Query = serde_json::from_value(body).map_err(|e| {
            reject(
                RejectionCode::SchemaValidation,
                format!("Query did not pass TRAPI validation: {e}"),
            )
        })?;

        let query_graph = match query.message.query_graph {
            Some(graph) if !graph.is_empty() => graph,
            _ => {
                return Err(reject(
                    RejectionCode::MissingQueryGraph,
                    "Unsupported query: query_graph missing from query.message or empty",
                )
                .into());
            }
        };

        if query_graph.nodes.len() != 2 || query_graph.edges.len() != 1 {
            return Err(reject(
                RejectionCode::UnsupportedQueryShape,
                format!(
                    "Unsupported query. Only one-hop queries supported (got {} nodes, {} edges)",
                    query_graph.nodes.len(),
                    query_graph.edges.len()
                ),
            )
            .into());
        }

        let options = QueryOptions::resolve(query.query_options.as_ref(), self.config)?;
        let mut query_graph = query_graph;

        let Some((edge_key, edge)) = query_graph.edges.iter_mut().next() else {
            return Err(QueryError::Invariant("one-hop graph without an edge".into()));
        };
        let edge_key = edge_key.clone();
        self.check_predicates(ctx, &edge_key, edge)?;
        let edge = edge.clone();

        for key in [&edge.subject, &edge.object] {
            if !query_graph.nodes.contains_key(key) {
                return Err(reject(
                    RejectionCode::QNodeNotFound,
                    format!("QNode id not found: {key}"),
                )
                .into());
            }
        }

        // Subject first, then object; with two anchored nodes the object wins.
        let mut anchor_key = None;
        for key in [&edge.subject, &edge.object] {
            if query_graph.nodes[key].is_anchored() {
                anchor_key = Some(key.clone());
            }
        }
        let Some(anchor_key) = anchor_key else {
            return Err(reject(
                RejectionCode::NoAnchor,
                "Unsupported query: at least one QNode must have ids",
            )
            .into());
        };
        let target_key = if anchor_key == edge.subject {
            edge.object.clone()
        } else {
            edge.subject.clone()
        };

        for key in [&target_key, &anchor_key] {
            if query_graph.nodes[key].has_constraints() {
                return Err(reject(
                    RejectionCode::ConstraintsUnsupported,
                    format!("{key} contains a constraint. COHD does not support constraints."),
                )
                .into());
            }
        }

        let criteria = CriteriaFilter::from_options(&options);
        ctx.debug(format!(
            "Anchor {anchor_key}, target {target_key}, method {}, criteria [{}], log level {}",
            options.method,
            criteria.names().join(", "),
            ctx.log_level().as_str()
        ));

        Ok(QueryPlan {
            query_graph,
            edge_key,
            edge,
            anchor_key,
            target_key,
            options,
            criteria,
        })
    }

    /// Normalize the edge's predicates in place and make sure at least one of
    /// them covers a predicate COHD can assert.
    fn check_predicates(
        &self,
        ctx: &mut QueryExecutionContext,
        edge_key: &str,
        edge: &mut QueryEdge,
    ) -> Result<(), Rejection> {
        // An empty list names no supported predicate and is rejected below.
        let Some(predicates) = edge.predicates.as_mut() else {
            return Ok(());
        };
        let ontology = self.collaborators.ontology;

        let mut supported = false;
        for predicate in predicates.iter_mut() {
            *predicate = ontology.normalize(predicate);
            if !ontology.is_predicate(predicate) {
                return Err(reject(
                    RejectionCode::UnknownPredicate,
                    format!("Unrecognized predicate: {predicate}"),
                ));
            }
            supported |= ontology
                .descendants(predicate)
                .iter()
                .any(|d| SUPPORTED_PREDICATES.contains(&d.as_str()));
        }

        if !supported {
            return Err(reject(
                RejectionCode::UnsupportedPredicate,
                format!(
                    "None of the predicates of {edge_key} ({}) are supported by COHD",
                    predicates.join(", ")
                ),
            ));
        }
        ctx.debug(format!("Predicates of {edge_key}: {}", predicates.join(", ")));
        Ok(())
    }

    pub fn run(
        &self,
        ctx: &mut QueryExecutionContext,
        plan: QueryPlan,
    ) -> Result<Outcome, QueryError> {
        let QueryPlan {
            mut query_graph,
            edge_key,
            edge,
            anchor_key,
            target_key,
            options,
            criteria,
        } = plan;
        let Collaborators {
            mapper,
            ontology,
            statistics,
            ..
        } = self.collaborators;

        let resolver = ConceptResolver::new(mapper, ontology, options.mapper_options());
        let resolution = match resolver.resolve(ctx, &mut query_graph, &anchor_key, &target_key)? {
            ResolutionOutcome::Resolved(resolution) => resolution,
            ResolutionOutcome::Unanswerable {
                status,
                description,
            } => {
                return Ok(Outcome::unanswerable(
                    ctx,
                    status,
                    description,
                    Some(query_graph),
                    Some(options),
                    self.config,
                ));
            }
        };

        let records = AssociationRetriever::new(statistics).retrieve(
            ctx,
            &resolution.anchor,
            &resolution.target,
            &options,
        )?;
        ctx.info(format!("{} candidate association records", records.len()));

        let builder = KnowledgeGraphBuilder::new(mapper, ontology, statistics, &resolution, &edge)
            .mapper_options(options.mapper_options())
            .biolink_only(options.biolink_only);
        let assembler = ResultAssembler::new(&resolution, &edge_key, options.max_results);

        for record in &records {
            if assembler.is_full(ctx) {
                break;
            }
            if let Some(failed) = criteria.first_failure(record) {
                ctx.debug(format!(
                    "OMOP:{} - OMOP:{} rejected by {failed}",
                    record.concept_id_1, record.concept_id_2
                ));
                continue;
            }
            let Some(accepted) = builder.add_record(ctx, record)? else {
                continue;
            };
            if assembler.push(ctx, &accepted) {
                ctx.info(format!("Reached max_results ({})", options.max_results));
            }
        }

        Ok(Outcome::finalize(ctx, query_graph, options, self.config))
    }
}

fn reject(code: RejectionCode, message: impl Into<String>) -> Rejection {
    let rejection = Rejection::new(code, message);
    tracing::warn!(code = ?rejection.code, message = %rejection.message, "query rejected");
    rejection
}
