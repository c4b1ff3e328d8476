//! npm package coordinates
//!
//! Storage paths have the form `<scope|name>/<name>/<version>/<file>` where the
//! first segment is the `@scope` for scoped packages and repeats the package name
//! otherwise; `<file>` is `<name>-<version>.tgz` or `package.json`. The shorter
//! `<name>/<version>/<file>` form is accepted on input.
//!
//! Registry URIs have the form `[@scope/]<name>/-/<name>-<version>.tgz`.

use crate::coordinates::ArtifactCoordinates;
use depot_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const NPM_LAYOUT: &str = "npm";

const TARBALL_EXTENSION: &str = "tgz";
const METADATA_EXTENSION: &str = "json";
const METADATA_FILE_NAME: &str = "package.json";

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("valid npm name pattern"));

static SCOPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[a-z0-9][a-z0-9._-]*$").expect("valid npm scope pattern"));

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("valid npm version pattern")
});

/// Coordinates of an npm package tarball or package document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpmArtifactCoordinates {
    scope: Option<String>,
    name: String,
    version: String,
    extension: String,
}

impl NpmArtifactCoordinates {
    /// Build validated coordinates for a package tarball.
    pub fn new(scope: Option<&str>, name: &str, version: &str) -> Result<Self> {
        Self::validated(String::new(), scope, name, version, TARBALL_EXTENSION)
    }

    /// Parse a storage path.
    ///
    /// # Example
    /// ```
    /// use depot_layout::NpmArtifactCoordinates;
    /// let c = NpmArtifactCoordinates::parse("@types/node/8.0.51/node-8.0.51.tgz").unwrap();
    /// assert_eq!(c.scope(), Some("@types"));
    /// assert_eq!(c.name(), "node");
    /// assert_eq!(c.version(), "8.0.51");
    /// ```
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('/').collect();

        let (package_dir, name, version, file_name) = match segments.as_slice() {
            [package_dir, name, version, file_name] => (Some(*package_dir), *name, *version, *file_name),
            [name, version, file_name] => (None, *name, *version, *file_name),
            _ => {
                return Err(Error::invalid_coordinates(
                    path,
                    "expected [scope/]name/version/filename",
                ));
            }
        };

        let scope = match package_dir {
            Some(dir) if dir.starts_with('@') => Some(dir),
            Some(dir) if dir != name => {
                return Err(Error::invalid_coordinates(
                    path,
                    format!("package directory [{}] does not match name [{}]", dir, name),
                ));
            }
            _ => None,
        };

        let extension = if file_name == METADATA_FILE_NAME {
            METADATA_EXTENSION
        } else {
            TARBALL_EXTENSION
        };

        let coordinates = Self::validated(path.to_string(), scope, name, version, extension)?;

        if extension == TARBALL_EXTENSION && file_name != coordinates.tarball_name() {
            return Err(Error::invalid_coordinates(
                path,
                format!(
                    "file name [{}] does not match [{}]",
                    file_name,
                    coordinates.tarball_name()
                ),
            ));
        }

        Ok(coordinates)
    }

    /// Parse a registry tarball URI of the form `[@scope/]name/-/name-version.tgz`.
    pub fn of_uri(uri: &str) -> Result<Self> {
        let segments: Vec<&str> = uri.trim_start_matches('/').split('/').collect();

        let (scope, name, file_name) = match segments.as_slice() {
            [scope, name, "-", file_name] => (Some(*scope), *name, *file_name),
            [name, "-", file_name] => (None, *name, *file_name),
            _ => {
                return Err(Error::invalid_coordinates(
                    uri,
                    "expected [scope/]name/-/name-version.tgz",
                ));
            }
        };

        if let Some(scope) = scope
            && !scope.starts_with('@')
        {
            return Err(Error::invalid_coordinates(
                uri,
                format!("scope [{}] must start with '@'", scope),
            ));
        }

        let version = file_name
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".tgz"))
            .ok_or_else(|| {
                Error::invalid_coordinates(
                    uri,
                    format!("file name [{}] is not a tarball of [{}]", file_name, name),
                )
            })?;

        Self::validated(uri.to_string(), scope, name, version, TARBALL_EXTENSION)
    }

    fn validated(
        origin: String,
        scope: Option<&str>,
        name: &str,
        version: &str,
        extension: &str,
    ) -> Result<Self> {
        let origin = if origin.is_empty() {
            format!("{}/{}", name, version)
        } else {
            origin
        };

        if let Some(scope) = scope
            && !SCOPE_PATTERN.is_match(scope)
        {
            return Err(Error::invalid_coordinates(
                origin,
                format!("invalid scope [{}]", scope),
            ));
        }

        if !NAME_PATTERN.is_match(name) {
            return Err(Error::invalid_coordinates(
                origin,
                format!("invalid package name [{}]", name),
            ));
        }

        if !VERSION_PATTERN.is_match(version) {
            return Err(Error::invalid_coordinates(
                origin,
                format!("invalid version [{}]", version),
            ));
        }

        Ok(Self {
            scope: scope.map(str::to_string),
            name: name.to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn tarball_name(&self) -> String {
        format!("{}-{}.{}", self.name, self.version, TARBALL_EXTENSION)
    }

    fn file_name(&self) -> String {
        if self.extension == METADATA_EXTENSION {
            METADATA_FILE_NAME.to_string()
        } else {
            self.tarball_name()
        }
    }

    fn package_dir(&self) -> &str {
        self.scope.as_deref().unwrap_or(&self.name)
    }
}

impl ArtifactCoordinates for NpmArtifactCoordinates {
    fn layout(&self) -> &str {
        NPM_LAYOUT
    }

    fn id(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn to_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.package_dir(),
            self.name,
            self.version,
            self.file_name()
        )
    }

    fn to_resource(&self) -> String {
        if self.extension == METADATA_EXTENSION {
            return self.to_path();
        }
        format!("{}/-/{}", self.id(), self.tarball_name())
    }

    fn coordinates(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(scope) = &self.scope {
            map.insert("scope".to_string(), scope.clone());
        }
        map.insert("name".to_string(), self.name.clone());
        map.insert("version".to_string(), self.version.clone());
        map.insert("extension".to_string(), self.extension.clone());
        map
    }
}

impl fmt::Display for NpmArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id(), self.version)
    }
}
