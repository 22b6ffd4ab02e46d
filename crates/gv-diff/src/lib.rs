//! Diff engine for GeoVersion.
//!
//! Tree diffs compare two immutable trees level by level and skip every
//! subtree whose id matches on both sides, so the cost follows the size of
//! the change rather than the size of the trees. Feature diffs compare two
//! versions of a feature attribute by attribute.
//!
//! Walks and counts take an optional progress listener and stop with
//! [`DiffError::Canceled`] once it is canceled.
//!
//! # Key Types
//!
//! - [`DiffEntry`] / [`ChangeType`] -- one added, removed, or modified node
//! - [`TreeDiffEntryIterator`] -- lazy structural diff of two trees
//! - [`DiffTree`] -- diff query with path filters and tree reporting
//! - [`DiffCounter`] / [`DiffObjectCount`] -- change counts without entries
//! - [`FeatureDiff`] / [`AttributeDiff`] -- per-attribute feature changes
//! - [`GeometryDiff`] -- reversible coordinate-level geometry patch

pub mod attribute_diff;
pub mod counter;
pub mod entry;
pub mod error;
pub mod feature_diff;
pub mod geometry_diff;
pub mod tree_diff;
pub mod walk;

pub use attribute_diff::{AttributeDiff, GenericAttributeDiff, GeometryAttributeDiff};
pub use counter::{DiffCounter, DiffObjectCount};
pub use entry::{ChangeType, DiffEntry};
pub use error::{DiffError, DiffResult};
pub use feature_diff::FeatureDiff;
pub use geometry_diff::GeometryDiff;
pub use tree_diff::TreeDiffEntryIterator;
pub use walk::{DiffEntries, DiffTree};
