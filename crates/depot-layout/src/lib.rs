//! # Depot Layouts
//!
//! Turns relative artifact paths into structured, validated coordinates.
//! Parsing is pure: it either yields complete coordinates or fails with
//! [`depot_core::Error::InvalidCoordinates`].

mod coordinates;
mod npm;
mod raw;
mod registry;

pub use coordinates::ArtifactCoordinates;
pub use npm::{NPM_LAYOUT, NpmArtifactCoordinates};
pub use raw::{RAW_LAYOUT, RawArtifactCoordinates};
pub use registry::{LayoutProvider, LayoutProviderRegistry, NpmLayoutProvider, RawLayoutProvider};
