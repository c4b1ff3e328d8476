use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A path could not be decoded into coordinates under the repository layout.
    #[error("Invalid coordinates for [{path}]: {reason}")]
    InvalidCoordinates { path: String, reason: String },

    /// Nothing could be materialized for the path.
    #[error("Artifact [{path}] not found.")]
    ArtifactResolution { path: String },

    /// The repository refuses to store the artifact.
    #[error("Artifact [{path}] cannot be stored: {reason}")]
    ArtifactStorage { path: String, reason: String },

    #[error("Failed to resolve proxied artifact [{path}]: {source}")]
    RemoteFetch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A metadata hook found an entry in a state it can never legally be in.
    #[error("Inconsistent artifact entry for [{path}]: {reason}")]
    InconsistentEntry { path: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository [{storage_id}:{repository_id}] not found")]
    RepositoryNotFound {
        storage_id: String,
        repository_id: String,
    },

    #[error("No provider registered for repository type '{0}'")]
    ProviderNotFound(String),

    #[error("Metadata store error: {0}")]
    Metadata(String),

    /// `depot.toml` is not valid TOML or does not fit the configuration schema.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use depot_core::Error;
    /// let err = Error::config_error("Storage 'storage0' has no basedir");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Helper for creating general errors with a message
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Other(anyhow::anyhow!("{}", msg.into()))
    }

    pub fn invalid_coordinates(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidCoordinates {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Error::ArtifactResolution { path: path.into() }
    }

    pub fn storage(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ArtifactStorage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn inconsistent_entry(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InconsistentEntry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means "this artifact does not exist" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ArtifactResolution { .. })
    }

    /// Wrap the error for surfacing through `AsyncRead` / `AsyncWrite`.
    pub fn into_io(self) -> std::io::Error {
        match self {
            Error::IoError(e) => e,
            other => std::io::Error::other(other),
        }
    }

    /// Recover a domain error that travelled through an `std::io::Error`.
    pub fn from_io(err: std::io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(domain) = inner.downcast::<Error>() {
                    return *domain;
                }
            }
            return Error::message("unrecoverable stream error");
        }
        Error::IoError(err)
    }
}
