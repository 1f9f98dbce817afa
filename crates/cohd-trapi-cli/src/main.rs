//! COHD CLI
//!
//! Runs one-hop TRAPI queries against a fixture-backed statistics store:
//! - `cohd query`: full pipeline, prints the response envelope
//! - `cohd validate`: hard checks and option resolution only
//!
//! stdout carries JSON only; status lines and tracing go to stderr.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use cohd_ontology::BiolinkOntology;
use cohd_trapi::{
    Collaborators, Fixture, InMemoryConceptMapper, InMemoryStatistics, OutcomeStatus, QueryError,
    QueryInterpreter, Rejection, RejectionCode, ServiceConfig, TrapiShapeValidator,
};
use colored::Colorize;
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

const REJECTED_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "cohd")]
#[command(author, version, about = "COHD TRAPI: one-hop co-occurrence queries")]
struct Cli {
    /// More logging on stderr (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the TRAPI response envelope.
    Query {
        /// Fixture with concepts, associations and mappings
        #[arg(long)]
        fixture: PathBuf,
        /// TRAPI query JSON (`-` for stdin)
        #[arg(long)]
        query: PathBuf,
        /// Biolink hierarchy JSON (defaults to the built-in hierarchy)
        #[arg(long)]
        ontology: Option<PathBuf>,
        /// Service config JSON; `COHD_*` variables still override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },

    /// Check a query without executing it and print the resolved plan.
    Validate {
        /// TRAPI query JSON (`-` for stdin)
        #[arg(long)]
        query: PathBuf,
        #[arg(long)]
        ontology: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Query {
            fixture,
            query,
            ontology,
            config,
            pretty,
        } => cmd_query(&fixture, &query, ontology.as_deref(), config.as_deref(), pretty),
        Commands::Validate {
            query,
            ontology,
            config,
        } => cmd_validate(&query, ontology.as_deref(), config.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let Some(path) = path else {
        return Ok(ServiceConfig::from_env());
    };
    let mut config = ServiceConfig::from_path(path)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn load_ontology(path: Option<&Path>) -> Result<BiolinkOntology> {
    match path {
        Some(path) => BiolinkOntology::from_path(path)
            .with_context(|| format!("failed to load ontology {}", path.display())),
        None => Ok(BiolinkOntology::builtin()),
    }
}

fn read_query(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut body = Vec::new();
        io::stdin()
            .read_to_end(&mut body)
            .context("failed to read query from stdin")?;
        return Ok(body);
    }
    std::fs::read(path).with_context(|| format!("failed to read query {}", path.display()))
}

/// Print the 400-equivalent body for a rejection and pick the exit code.
fn report(err: QueryError) -> Result<ExitCode> {
    match err {
        QueryError::Rejected(rejection) => {
            eprintln!("{} {}", "rejected".red().bold(), rejection.message);
            println!("{}", serde_json::to_string_pretty(&rejection.to_json())?);
            Ok(ExitCode::from(REJECTED_EXIT))
        }
        other => Err(other).context("query failed"),
    }
}

fn cmd_query(
    fixture: &Path,
    query: &Path,
    ontology: Option<&Path>,
    config: Option<&Path>,
    pretty: bool,
) -> Result<ExitCode> {
    let config = load_config(config)?;
    let ontology = load_ontology(ontology)?;
    let fixture = Fixture::from_path(fixture)?;
    tracing::info!(
        concepts = fixture.concepts.len(),
        associations = fixture.associations.len(),
        "loaded fixture"
    );
    let statistics = InMemoryStatistics::from_fixture(&fixture);
    let mapper = InMemoryConceptMapper::from_fixture(&fixture);
    let body = read_query(query)?;

    let interpreter = QueryInterpreter::new(
        Collaborators {
            validator: &TrapiShapeValidator,
            mapper: &mapper,
            ontology: &ontology,
            statistics: &statistics,
        },
        &config,
    );
    let outcome = match interpreter.execute_slice(&body) {
        Ok(outcome) => outcome,
        Err(err) => return report(err),
    };

    let label = match outcome.status() {
        OutcomeStatus::Success => "ok".green().bold(),
        OutcomeStatus::NoResults => "empty".yellow().bold(),
        _ => "unanswerable".yellow().bold(),
    };
    eprintln!(
        "{} {} ({} association lookups)",
        label,
        outcome.description(),
        statistics.calls().len()
    );

    let envelope = outcome.to_json()?;
    if pretty {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", serde_json::to_string(&envelope)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(query: &Path, ontology: Option<&Path>, config: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config)?;
    let ontology = load_ontology(ontology)?;
    let statistics = InMemoryStatistics::new();
    let mapper = InMemoryConceptMapper::new();
    let raw = read_query(query)?;
    let body: Value = match serde_json::from_slice(&raw) {
        Ok(body) => body,
        Err(e) => {
            return report(QueryError::Rejected(Rejection::new(
                RejectionCode::NotJson,
                format!("Request body is not valid JSON: {e}"),
            )))
        }
    };

    let interpreter = QueryInterpreter::new(
        Collaborators {
            validator: &TrapiShapeValidator,
            mapper: &mapper,
            ontology: &ontology,
            statistics: &statistics,
        },
        &config,
    );
    let plan = match interpreter.validate(body) {
        Ok(plan) => plan,
        Err(err) => return report(err),
    };

    eprintln!("{} query is valid", "ok".green().bold());
    let summary = json!({
        "edge": plan.edge_key,
        "anchor": plan.anchor_key,
        "target": plan.target_key,
        "predicates": plan.edge.predicates,
        "criteria": plan.criteria.names(),
        "query_options": plan.options,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}
