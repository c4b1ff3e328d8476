//! # Depot Metadata
//!
//! Artifact entries and the query model used to find them.
//!
//! ## Overview
//!
//! Every artifact path has at most one [`ArtifactEntry`], keyed by
//! (storage id, repository id, path). Entries record coordinates, size,
//! timestamps, download count and tags. Proxy repositories produce the
//! remote variant, which additionally records whether the bytes are cached.
//!
//! Mutations happen under an [`EntryLock`] obtained from the store, one
//! lookup-mutate-save cycle at a time; searches never lock.

mod criteria;
mod entry;
mod memory;
mod store;

pub use criteria::{Expression, Field, Operator, Paginator, Predicate, Selector, SortOrder};
pub use entry::{ArtifactEntry, ArtifactEntryKey, EntryKind};
pub use memory::InMemoryArtifactEntryStore;
pub use store::{ArtifactEntryStore, EntryLock};
