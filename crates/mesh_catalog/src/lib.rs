//! Mesh catalog: picks the 3-D model that best represents a telemetry entity.
//!
//! Matching runs in two stages:
//! 1. The entity's `Type` string (`Air+Medium+FixedWing`) is classified into a
//!    four-slot [`Taxonomy`]. A candidate mesh passes when each slot it defines
//!    equals the entity's slot; slots it leaves empty are wildcards.
//! 2. Passing candidates are scored by ordered character overlap between their
//!    display names and the entity's name. The first highest score wins.
//!
//! [`CachedMeshFinder`] memoises results per `(type, name)` pair.

pub mod cache;
pub mod error;
pub mod library;
pub mod matcher;
pub mod taxonomy;

pub use cache::{CacheStats, CachedMeshFinder};
pub use error::CatalogError;
pub use library::{MeshEntry, MeshLibrary, ShapeRewrite};
pub use matcher::{MeshMatcher, MeshResolver, ANY_TYPE, WILDCARD_NAME};
pub use taxonomy::{clean_token, Slot, Taxonomy};
