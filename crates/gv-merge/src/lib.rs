//! Three-way merge for GeoVersion.
//!
//! Both sides of a merge are diffed against their common ancestor. Changes
//! that touch disjoint paths, or disjoint attributes of the same feature,
//! merge cleanly; everything else is reported as a [`Conflict`].
//!
//! # Key Types
//!
//! - [`MergeScenario`] -- ancestor, ours, and theirs trees under comparison
//! - [`ConflictsReport`] -- conflicts plus the changes that carry over
//! - [`MergeOutcome`] -- up to date, fast-forward, or a merged tree

pub mod conflict;
pub mod error;
mod features;
pub mod scenario;

pub use conflict::{Conflict, ConflictsReport};
pub use error::{MergeError, MergeResult};
pub use scenario::{check_conflicts, merge_trees, MergeOutcome, MergeScenario};
