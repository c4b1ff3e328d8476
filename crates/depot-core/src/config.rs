//! Configuration management for Depot
//!
//! Loads configuration with priority:
//! 1. Specified config file
//! 2. depot.toml in the current directory or one of its parents
//!
//! `${VAR_NAME}` references in the base URI and proxy URLs are resolved
//! from the environment.

use crate::repository::{RemoteRepository, Repository, RepositoryType, Storage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const CONFIG_FILE_NAME: &str = "depot.toml";

/// Depot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotConfig {
    /// Externally visible base URI used to build artifact URLs
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    #[serde(default)]
    pub storages: BTreeMap<String, StorageConfig>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub basedir: PathBuf,

    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,
}

/// Repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,

    #[serde(default = "default_layout")]
    pub layout: String,

    /// Defaults to `<storage basedir>/<repository id>`
    pub basedir: Option<PathBuf>,

    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default = "default_true")]
    pub in_service: bool,

    pub allows_deployment: Option<bool>,
}

/// Remote side of a proxy repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
}

impl DepotConfig {
    /// Load configuration from depot.toml found in the current directory or a parent
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            Self::find_config_file()?
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path).map_err(|e| {
            Error::config_error(format!(
                "Failed to read config file {:?}: {}",
                config_path, e
            ))
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.resolve_env_vars();

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Find depot.toml by searching current directory and parents
    fn find_config_file() -> Result<PathBuf> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        Err(Error::config_error(format!(
            "{} not found in the current directory or any parent",
            CONFIG_FILE_NAME
        )))
    }

    /// Resolve ${VAR_NAME} references to environment variables
    fn resolve_env_vars(&mut self) {
        if let Some(resolved) = Self::resolve_env_var(&self.base_uri) {
            self.base_uri = resolved;
        }

        for storage in self.storages.values_mut() {
            for repository in storage.repositories.values_mut() {
                if let Some(proxy) = repository.proxy.as_mut()
                    && let Some(resolved) = Self::resolve_env_var(&proxy.url)
                {
                    proxy.url = resolved;
                }
            }
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Build the immutable storage/repository topology
    pub fn build(&self) -> Result<Configuration> {
        let base_uri = Url::parse(&self.base_uri)
            .map_err(|e| Error::config_error(format!("Invalid base_uri '{}': {}", self.base_uri, e)))?;

        let mut storages = BTreeMap::new();
        for (storage_id, storage_config) in &self.storages {
            let mut storage = Storage::new(storage_id.clone(), storage_config.basedir.clone());

            for (repository_id, repo_config) in &storage_config.repositories {
                let repository =
                    repo_config.to_repository(storage_id, repository_id, &storage_config.basedir)?;
                storage.add_repository(repository);
            }

            for repository in storage.repositories() {
                for member in &repository.members {
                    if storage.repository(member).is_none() {
                        return Err(Error::config_error(format!(
                            "Group repository '{}' references unknown member '{}'",
                            repository.id, member
                        )));
                    }
                }
            }

            storages.insert(storage_id.clone(), Arc::new(storage));
        }

        Ok(Configuration { base_uri, storages })
    }

    /// Create test-friendly defaults: one storage with a hosted, a proxy and a group repository
    pub fn test_defaults(basedir: impl Into<PathBuf>) -> Self {
        let basedir = basedir.into();
        let mut repositories = BTreeMap::new();
        repositories.insert(
            "releases".to_string(),
            RepositoryConfig {
                repo_type: RepositoryType::Hosted,
                layout: "npm".to_string(),
                basedir: None,
                proxy: None,
                members: Vec::new(),
                in_service: true,
                allows_deployment: None,
            },
        );
        repositories.insert(
            "npmjs".to_string(),
            RepositoryConfig {
                repo_type: RepositoryType::Proxy,
                layout: "npm".to_string(),
                basedir: None,
                proxy: Some(ProxyConfig {
                    url: "https://registry.npmjs.org".to_string(),
                }),
                members: Vec::new(),
                in_service: true,
                allows_deployment: None,
            },
        );
        repositories.insert(
            "public".to_string(),
            RepositoryConfig {
                repo_type: RepositoryType::Group,
                layout: "npm".to_string(),
                basedir: None,
                proxy: None,
                members: vec!["releases".to_string(), "npmjs".to_string()],
                in_service: true,
                allows_deployment: None,
            },
        );

        let mut storages = BTreeMap::new();
        storages.insert(
            "storage0".to_string(),
            StorageConfig {
                basedir: basedir.join("storage0"),
                repositories,
            },
        );

        Self {
            base_uri: default_base_uri(),
            storages,
        }
    }
}

impl RepositoryConfig {
    fn to_repository(&self, storage_id: &str, repository_id: &str, storage_basedir: &Path) -> Result<Repository> {
        let remote = match (self.repo_type, &self.proxy) {
            (RepositoryType::Proxy, Some(proxy)) => Some(RemoteRepository {
                url: proxy.url.clone(),
            }),
            (RepositoryType::Proxy, None) => {
                return Err(Error::config_error(format!(
                    "Proxy repository '{}' has no proxy.url",
                    repository_id
                )));
            }
            _ => None,
        };

        Ok(Repository {
            id: repository_id.to_string(),
            storage_id: storage_id.to_string(),
            repo_type: self.repo_type,
            layout: self.layout.clone(),
            basedir: self
                .basedir
                .clone()
                .unwrap_or_else(|| storage_basedir.join(repository_id)),
            remote,
            members: self.members.clone(),
            in_service: self.in_service,
            allows_deployment: self
                .allows_deployment
                .unwrap_or(self.repo_type == RepositoryType::Hosted),
        })
    }
}

/// The storage/repository topology in effect, read-only during resolution
#[derive(Debug, Clone)]
pub struct Configuration {
    pub base_uri: Url,
    storages: BTreeMap<String, Arc<Storage>>,
}

impl Configuration {
    pub fn storage(&self, storage_id: &str) -> Option<Arc<Storage>> {
        self.storages.get(storage_id).cloned()
    }

    pub fn repository(&self, storage_id: &str, repository_id: &str) -> Result<Arc<Repository>> {
        self.storages
            .get(storage_id)
            .and_then(|storage| storage.repository(repository_id))
            .ok_or_else(|| Error::RepositoryNotFound {
                storage_id: storage_id.to_string(),
                repository_id: repository_id.to_string(),
            })
    }

    pub fn storages(&self) -> impl Iterator<Item = &Arc<Storage>> {
        self.storages.values()
    }
}

fn default_base_uri() -> String {
    "http://localhost:48080/".to_string()
}

fn default_layout() -> String {
    "raw".to_string()
}

fn default_true() -> bool {
    true
}
