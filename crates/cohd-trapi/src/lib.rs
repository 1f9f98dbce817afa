//! COHD TRAPI: one-hop association queries over OMOP co-occurrence
//! statistics.
//!
//! A query graph with two nodes and one edge comes in; a knowledge graph of
//! `biolink:correlated_with` edges plus result bindings goes out.
//!
//! ## Pipeline
//!
//! - [`QueryInterpreter`]: validation, option resolution, orchestration
//! - [`ConceptResolver`]: CURIE → OMOP concept, category → (domain, class)
//! - [`AssociationRetriever`]: statistics lookups, merged and re-sorted
//! - [`CriteriaFilter`]: conjunction of [`Criterion`]s over one record
//! - [`KnowledgeGraphBuilder`]: lazy concepts, deduplicated nodes, edges
//! - [`ResultAssembler`]: bindings, result cap, response envelope
//!
//! ## Collaborators
//!
//! Schema validation, concept mapping, ontology closure and the statistics
//! store sit behind the traits in [`collaborators`]. [`memory`] has
//! fixture-backed implementations; `cohd-ontology` has a Biolink hierarchy.
//!
//! ```no_run
//! use cohd_trapi::{
//!     Collaborators, Fixture, InMemoryConceptMapper, InMemoryStatistics, OntologyService,
//!     QueryInterpreter, ServiceConfig, TrapiShapeValidator,
//! };
//!
//! # fn run(ontology: &dyn OntologyService) -> anyhow::Result<()> {
//! let fixture = Fixture::from_path("fixture.json".as_ref())?;
//! let statistics = InMemoryStatistics::from_fixture(&fixture);
//! let mapper = InMemoryConceptMapper::from_fixture(&fixture);
//! let config = ServiceConfig::from_env();
//!
//! let interpreter = QueryInterpreter::new(
//!     Collaborators {
//!         validator: &TrapiShapeValidator,
//!         mapper: &mapper,
//!         ontology,
//!         statistics: &statistics,
//!     },
//!     &config,
//! );
//! let outcome = interpreter.execute_slice(br#"{"message": {}}"#)?;
//! println!("{}", outcome.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod association;
pub mod biolink;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod criteria;
pub mod error;
pub mod interpreter;
pub mod kgraph;
pub mod memory;
pub mod model;
pub mod options;
pub mod resolver;
pub mod results;
pub mod validate;

pub use association::{AssociationRecord, AssociationRetriever};
pub use collaborators::{
    AssociationQuery, BiolinkMapping, Collaborators, ConceptDetail, ConceptId, ConceptMapper,
    MapperOptions, OmopMapping, OntologyService, SchemaValidator, StatisticsStore,
};
pub use config::ServiceConfig;
pub use context::{LogEntry, LogLevel, QueryExecutionContext};
pub use criteria::{Criterion, CriteriaFilter};
pub use error::{CollaboratorError, QueryError, Rejection, RejectionCode, Result};
pub use interpreter::{QueryInterpreter, QueryPlan};
pub use kgraph::{AcceptedEdge, KnowledgeGraphBuilder, ResolvedConcept};
pub use memory::{Fixture, InMemoryConceptMapper, InMemoryStatistics};
pub use model::{Envelope, KnowledgeGraph, OutcomeStatus, Query, QueryGraph, QueryResult};
pub use options::{Method, QueryOptions};
pub use resolver::{ConceptResolver, Resolution, ResolvedAnchor, ResolvedTarget};
pub use results::{Outcome, ResultAssembler};
pub use validate::TrapiShapeValidator;
