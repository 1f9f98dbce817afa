//! Structural TRAPI check used when no published-schema validator is wired in.
//!
//! Only the parts of the query this pipeline reads are checked. Anything
//! else in the body is passed through untouched.

use crate::collaborators::SchemaValidator;
use crate::error::CollaboratorError;
use serde_json::{Map, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct TrapiShapeValidator;

impl SchemaValidator for TrapiShapeValidator {
    fn validate(&self, query: &Value) -> Result<(), CollaboratorError> {
        let root = object(query, "request body")?;
        let message = object(required(root, "message", "request body")?, "message")?;

        if let Some(options) = root.get("query_options") {
            if !options.is_null() {
                object(options, "query_options")?;
            }
        }

        let Some(query_graph) = message.get("query_graph") else {
            return Ok(());
        };
        if query_graph.is_null() {
            return Ok(());
        }
        let query_graph = object(query_graph, "message.query_graph")?;

        if let Some(nodes) = query_graph.get("nodes") {
            for (key, node) in object(nodes, "query_graph.nodes")? {
                let path = format!("query_graph.nodes.{key}");
                let node = object(node, &path)?;
                strings(node, "ids", &path)?;
                strings(node, "categories", &path)?;
                if let Some(constraints) = node.get("constraints") {
                    if !constraints.is_null() && !constraints.is_array() {
                        return Err(schema(format!("{path}.constraints must be an array")));
                    }
                }
            }
        }

        if let Some(edges) = query_graph.get("edges") {
            for (key, edge) in object(edges, "query_graph.edges")? {
                let path = format!("query_graph.edges.{key}");
                let edge = object(edge, &path)?;
                for end in ["subject", "object"] {
                    if !required(edge, end, &path)?.is_string() {
                        return Err(schema(format!("{path}.{end} must be a string")));
                    }
                }
                strings(edge, "predicates", &path)?;
            }
        }

        Ok(())
    }
}

fn schema(message: String) -> CollaboratorError {
    CollaboratorError::Schema(message)
}

fn object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, CollaboratorError> {
    value
        .as_object()
        .ok_or_else(|| schema(format!("{path} must be an object")))
}

fn required<'v>(
    map: &'v Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<&'v Value, CollaboratorError> {
    map.get(field)
        .ok_or_else(|| schema(format!("{path} is missing required field `{field}`")))
}

/// Optional field holding a string or an array of strings.
fn strings(map: &Map<String, Value>, field: &str, path: &str) -> Result<(), CollaboratorError> {
    match map.get(field) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
        Some(_) => Err(schema(format!(
            "{path}.{field} must be a string or an array of strings"
        ))),
    }
}
