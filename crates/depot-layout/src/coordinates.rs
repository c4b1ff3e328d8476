//! Layout-independent view of artifact coordinates

use std::collections::BTreeMap;
use std::fmt;

/// Structured identity of an artifact decoded from its path.
///
/// Implementations are immutable: a value only exists once parsing succeeded.
pub trait ArtifactCoordinates: fmt::Debug + Send + Sync {
    /// Layout alias these coordinates belong to (e.g. "npm")
    fn layout(&self) -> &str;

    /// Layout-specific artifact id, without the version
    fn id(&self) -> String;

    fn version(&self) -> Option<&str>;

    /// Relative storage path
    fn to_path(&self) -> String;

    /// Relative path under which the artifact is published to clients.
    ///
    /// Defaults to the storage path.
    fn to_resource(&self) -> String {
        self.to_path()
    }

    /// Flat key/value view, used by coordinate searches
    fn coordinates(&self) -> BTreeMap<String, String>;
}
