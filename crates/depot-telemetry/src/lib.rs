//! # Depot Telemetry
//!
//! Tracing subscriber and OpenTelemetry setup, plus span helpers for artifact
//! operations.
//!
//! Library crates only emit `tracing` events; binaries and tests that want to
//! see them call [`init_telemetry`] once at start-up.

mod spans;
mod tracer;

pub use spans::{ArtifactOperation, ArtifactSpanAttributes, trace_artifact_operation};
pub use tracer::{init_telemetry, register_span_processor, tracer_provider};

/// Span attribute names for artifact operations.
pub mod attributes {
    pub const DEPOT_OPERATION_NAME: &str = "depot.operation.name";
    pub const DEPOT_STORAGE_ID: &str = "depot.storage.id";
    pub const DEPOT_REPOSITORY_ID: &str = "depot.repository.id";
    pub const DEPOT_REPOSITORY_TYPE: &str = "depot.repository.type";
    pub const DEPOT_ARTIFACT_PATH: &str = "depot.artifact.path";
    pub const DEPOT_ARTIFACT_OUTCOME: &str = "depot.artifact.outcome";
    pub const DEPOT_SEARCH_RESULTS: &str = "depot.search.results";

    // Tracer name
    pub const SYSTEM_NAME: &str = "depot";
}
