//! Commit history operations for GeoVersion.
//!
//! Commits form a directed acyclic graph through their parent links. This
//! crate walks that graph: newest-first history logs and the common-ancestor
//! search that three-way merges start from.
//!
//! # Key Types
//!
//! - [`CommitGraph`] -- parent links and commit times, from any source
//! - [`StoreCommitGraph`] / [`AncestryGraph`] -- object-database and in-memory graphs
//! - [`CommitLog`] -- lazy newest-first history walk
//! - [`CommonAncestorSearch`] -- partitioned lowest-common-ancestor search

pub mod ancestor;
pub mod config;
pub mod error;
pub mod graph;
pub mod log;

pub use ancestor::{find_common_ancestor, CommonAncestorSearch};
pub use config::AncestryConfig;
pub use error::{DagError, DagResult};
pub use graph::{AncestryGraph, CommitGraph, StoreCommitGraph};
pub use log::CommitLog;
