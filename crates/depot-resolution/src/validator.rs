//! Repository policy checks applied before any artifact operation

use depot_core::{Error, RepositoryPath, Result};

/// Rejects operations the target repository does not permit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactOperationsValidator;

impl ArtifactOperationsValidator {
    pub fn new() -> Self {
        Self
    }

    /// Checks common to reads and writes: the path stays inside the repository
    /// and the repository is in service.
    pub fn validate(&self, path: &RepositoryPath) -> Result<()> {
        if path.escapes_root() {
            return Err(Error::Validation(format!(
                "Path [{}] escapes the repository root",
                path
            )));
        }

        let repository = path.repository();
        if !repository.in_service {
            return Err(Error::Validation(format!(
                "Repository [{}:{}] is out of service",
                repository.storage_id, repository.id
            )));
        }

        Ok(())
    }

    /// [`validate`](Self::validate) plus the repository's deployment policy.
    pub fn validate_deployment(&self, path: &RepositoryPath) -> Result<()> {
        self.validate(path)?;

        if !path.repository().allows_deployment {
            return Err(Error::storage(
                path.to_string(),
                "repository does not allow deployment",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::Repository;
    use std::sync::Arc;

    fn hosted() -> Repository {
        Repository::hosted("storage0", "releases", "npm", "/tmp/releases")
    }

    #[test]
    fn test_escaping_paths_are_rejected() {
        let validator = ArtifactOperationsValidator::new();
        let repository = Arc::new(hosted());

        for bad in ["/etc/passwd", "a/../../b", "../releases2/x"] {
            let err = validator
                .validate(&RepositoryPath::new(repository.clone(), bad))
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad}");
        }
        assert!(
            validator
                .validate(&RepositoryPath::new(repository, "a/b/../c"))
                .is_ok()
        );
    }

    #[test]
    fn test_out_of_service_repository() {
        let mut repository = hosted();
        repository.in_service = false;
        let path = RepositoryPath::new(Arc::new(repository), "a/b");

        let err = ArtifactOperationsValidator::new().validate(&path).unwrap_err();
        assert!(err.to_string().contains("out of service"));
    }

    #[test]
    fn test_deployment_policy() {
        let validator = ArtifactOperationsValidator::new();
        let proxy = Repository::proxy("storage0", "npmjs", "npm", "/tmp/npmjs", "https://registry.npmjs.org");
        let path = RepositoryPath::new(Arc::new(proxy), "react/react/18.2.0/react-18.2.0.tgz");

        assert!(validator.validate(&path).is_ok());
        let err = validator.validate_deployment(&path).unwrap_err();
        assert!(matches!(err, Error::ArtifactStorage { .. }));

        let hosted = RepositoryPath::new(Arc::new(hosted()), "react/react/18.2.0/react-18.2.0.tgz");
        assert!(validator.validate_deployment(&hosted).is_ok());
    }
}
