//! Core types for Depot
//!
//! This crate provides the error taxonomy, the configuration and storage/repository
//! topology, and repository-scoped paths shared by every other Depot crate.

pub mod config;
pub mod error;
pub mod path;
pub mod repository;

// Re-exports
pub use config::{Configuration, DepotConfig, ProxyConfig, RepositoryConfig, StorageConfig};
pub use error::{Error, Result};
pub use path::{RepositoryPath, RepositoryPathResolver};
pub use repository::{RemoteRepository, Repository, RepositoryType, Storage};
