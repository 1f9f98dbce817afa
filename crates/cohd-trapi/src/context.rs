//! Request-scoped mutable state.
//!
//! One `QueryExecutionContext` is created per query and threaded by `&mut`
//! through every stage. Nothing in it outlives the response.

use crate::collaborators::ConceptId;
use crate::kgraph::ResolvedConcept;
use crate::model::{KnowledgeGraph, OutcomeStatus, QueryResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// TRAPI log entry returned in the envelope's `logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub code: Option<OutcomeStatus>,
    pub message: String,
}

#[derive(Debug)]
pub struct QueryExecutionContext {
    log_level: LogLevel,
    logs: Vec<LogEntry>,
    /// Every concept met so far, keyed by OMOP id. Includes concepts never
    /// exposed in the knowledge graph.
    pub(crate) concepts: BTreeMap<ConceptId, ResolvedConcept>,
    pub(crate) knowledge_graph: KnowledgeGraph,
    pub(crate) results: Vec<QueryResult>,
}

impl QueryExecutionContext {
    pub fn new(log_level: LogLevel) -> Self {
        Self {
            log_level,
            logs: Vec::new(),
            concepts: BTreeMap::new(),
            knowledge_graph: KnowledgeGraph::default(),
            results: Vec::new(),
        }
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Record a message in the TRAPI log (if at or above the request's level)
    /// and forward it to `tracing`.
    pub fn log(&mut self, level: LogLevel, code: Option<OutcomeStatus>, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(code = ?code, "{message}"),
            LogLevel::Info => tracing::info!(code = ?code, "{message}"),
            LogLevel::Warning => tracing::warn!(code = ?code, "{message}"),
            LogLevel::Error => tracing::error!(code = ?code, "{message}"),
        }
        if level >= self.log_level {
            self.logs.push(LogEntry {
                timestamp: Local::now().to_rfc3339(),
                level,
                code,
                message,
            });
        }
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, None, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, None, message);
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn knowledge_graph(&self) -> &KnowledgeGraph {
        &self.knowledge_graph
    }

    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn concept(&self, concept_id: ConceptId) -> Option<&ResolvedConcept> {
        self.concepts.get(&concept_id)
    }

    pub(crate) fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    pub(crate) fn take_graph(&mut self) -> (KnowledgeGraph, Vec<QueryResult>) {
        (
            std::mem::take(&mut self.knowledge_graph),
            std::mem::take(&mut self.results),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_below_request_level_are_dropped() {
        let mut ctx = QueryExecutionContext::new(LogLevel::Warning);
        ctx.debug("noise");
        ctx.info("still noise");
        ctx.log(
            LogLevel::Warning,
            Some(OutcomeStatus::CouldNotMapCurieToLocalKG),
            "kept",
        );
        assert_eq!(ctx.logs().len(), 1);
        assert_eq!(ctx.logs()[0].message, "kept");
        assert_eq!(ctx.logs()[0].level, LogLevel::Warning);
    }

    #[test]
    fn raising_the_level_filters_later_entries() {
        let mut ctx = QueryExecutionContext::new(LogLevel::Debug);
        ctx.debug("kept");
        ctx.set_log_level(LogLevel::Error);
        assert_eq!(ctx.log_level(), LogLevel::Error);
        ctx.log(LogLevel::Warning, None, "dropped");
        assert_eq!(ctx.logs().len(), 1);
    }

    #[test]
    fn log_level_parses_python_style_names() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("TRACE".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(LogLevel::Debug).unwrap(),
            serde_json::json!("DEBUG")
        );
    }
}
