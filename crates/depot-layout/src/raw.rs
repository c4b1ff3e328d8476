//! Coordinates for repositories without a naming scheme

use crate::coordinates::ArtifactCoordinates;
use depot_core::{Error, Result};
use std::collections::BTreeMap;

pub const RAW_LAYOUT: &str = "raw";

/// The path is the whole identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawArtifactCoordinates {
    path: String,
}

impl RawArtifactCoordinates {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::invalid_coordinates(path, "empty path"));
        }
        Ok(Self {
            path: trimmed.to_string(),
        })
    }
}

impl ArtifactCoordinates for RawArtifactCoordinates {
    fn layout(&self) -> &str {
        RAW_LAYOUT
    }

    fn id(&self) -> String {
        self.path.clone()
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn to_path(&self) -> String {
        self.path.clone()
    }

    fn coordinates(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("path".to_string(), self.path.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        let c = RawArtifactCoordinates::parse("/org/acme/tool.zip").unwrap();
        assert_eq!(c.to_path(), "org/acme/tool.zip");
        assert_eq!(c.coordinates()["path"], "org/acme/tool.zip");
        assert!(RawArtifactCoordinates::parse("/").is_err());
    }
}
