//! drift-model: element forest data model for the drift comparison engine.
//!
//! An API surface under comparison is represented as a *forest* of typed
//! elements. Elements live in an arena owned by their [`Forest`]; parentage
//! is the only ownership relation, while cross-references between elements
//! form a separate, possibly cyclic graph kept in adjacency maps on the
//! forest.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Forest`] -- arena-backed element tree plus the reference graph
//! - [`Element`], [`ElementId`] -- a single node and its arena handle
//! - [`ElementKind`] -- kind tag with the sibling ordering rules
//! - [`ReferenceKind`] -- typed cross-reference edges
//! - [`Archive`], [`ApiSurface`] -- input artifacts and their grouping

pub mod archive;
pub mod element;
pub mod forest;
pub mod kind;
pub mod reference;

pub use archive::{ApiSurface, Archive, ArchiveId, ArchiveRecord, ArchiveRole, MemoryArchive};
pub use element::{Element, ElementId, ElementSnapshot};
pub use forest::Forest;
pub use kind::ElementKind;
pub use reference::{Reference, ReferenceKind};
