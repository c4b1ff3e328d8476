//! # Depot Resolution
//!
//! The [`ArtifactResolutionService`] façade used by front-ends, and the
//! [`ArtifactOperationsValidator`] policy checks it applies.

mod service;
mod validator;

pub use service::ArtifactResolutionService;
pub use validator::ArtifactOperationsValidator;
