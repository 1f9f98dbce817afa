//! Error families of one query execution.
//!
//! Hard rejections, collaborator failures and internal defects are errors.
//! Soft outcomes ("valid but unanswerable") are not: they travel as an
//! [`crate::Outcome`] with a non-success status.

use serde::Serialize;

/// Failure raised by an external collaborator (mapper, ontology, statistics
/// store, schema validator). Propagated unchanged; the pipeline never retries.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned invalid data: {message}")]
    InvalidData {
        service: &'static str,
        message: String,
    },
    #[error("schema validation failed: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectionCode {
    NotJson,
    MissingBody,
    SchemaValidation,
    MissingQueryGraph,
    UnsupportedQueryShape,
    QNodeNotFound,
    UnknownPredicate,
    UnsupportedPredicate,
    UnsupportedMethod,
    NoAnchor,
    ConstraintsUnsupported,
}

/// A hard rejection: the request itself is malformed or asks for something
/// this reasoner does not do. Always produced before any retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> u16 {
        400
    }

    /// Body returned to the client in place of a TRAPI envelope.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.http_status(),
            "code": self.code,
            "detail": self.message,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    /// Internal inconsistency; a defect, never a user error.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl QueryError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            QueryError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_body_carries_code_and_detail() {
        let r = Rejection::new(RejectionCode::NoAnchor, "no ids");
        let body = r.to_json();
        assert_eq!(body["status"], 400);
        assert_eq!(body["code"], "NoAnchor");
        assert_eq!(body["detail"], "no ids");
    }

    #[test]
    fn rejection_converts_into_query_error() {
        let err: QueryError = Rejection::new(RejectionCode::MissingBody, "empty").into();
        assert_eq!(
            err.rejection().map(|r| r.code),
            Some(RejectionCode::MissingBody)
        );
    }
}
