//! Span helpers for artifact operations

use crate::attributes::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOperation {
    Read,
    Write,
    Fetch,
    Search,
    Count,
}

impl ArtifactOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Fetch => "fetch",
            Self::Search => "search",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for ArtifactOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes for tracing one resolution call
#[derive(Debug, Clone)]
pub struct ArtifactSpanAttributes {
    pub operation: ArtifactOperation,
    pub storage_id: String,
    pub repository_id: String,
    pub repository_type: String,
    /// Artifact path; `None` for repository-wide operations
    pub path: Option<String>,
    /// `ok`, `not_found`, or the error kind
    pub outcome: String,
    /// Matching entries of a search or count
    pub results: Option<u64>,
}

/// Record a span for a completed artifact operation.
pub fn trace_artifact_operation(attrs: ArtifactSpanAttributes) {
    let span = tracing::info_span!(
        "artifact_operation",
        { DEPOT_OPERATION_NAME } = %attrs.operation,
        { DEPOT_STORAGE_ID } = %attrs.storage_id,
        { DEPOT_REPOSITORY_ID } = %attrs.repository_id,
        { DEPOT_REPOSITORY_TYPE } = %attrs.repository_type,
        { DEPOT_ARTIFACT_PATH } = tracing::field::Empty,
        { DEPOT_ARTIFACT_OUTCOME } = %attrs.outcome,
        { DEPOT_SEARCH_RESULTS } = tracing::field::Empty,
    );

    if let Some(path) = &attrs.path {
        span.record(DEPOT_ARTIFACT_PATH, path.as_str());
    }
    if let Some(results) = attrs.results {
        span.record(DEPOT_SEARCH_RESULTS, results);
    }

    let _guard = span.enter();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_artifact_operation() {
        trace_artifact_operation(ArtifactSpanAttributes {
            operation: ArtifactOperation::Fetch,
            storage_id: "storage0".to_string(),
            repository_id: "npmjs".to_string(),
            repository_type: "proxy".to_string(),
            path: Some("react/react/18.2.0/react-18.2.0.tgz".to_string()),
            outcome: "ok".to_string(),
            results: None,
        });
        trace_artifact_operation(ArtifactSpanAttributes {
            operation: ArtifactOperation::Count,
            storage_id: "storage0".to_string(),
            repository_id: "public".to_string(),
            repository_type: "group".to_string(),
            path: None,
            outcome: "ok".to_string(),
            results: Some(2),
        });
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(ArtifactOperation::Search.to_string(), "search");
    }
}
