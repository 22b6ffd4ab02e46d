//! Error types for the merge crate.

use crate::conflict::ConflictsReport;

/// Errors that can occur while merging trees.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),

    /// Tree editing failed.
    #[error("tree error: {0}")]
    Tree(#[from] gv_tree::TreeError),

    /// Diff computation failed.
    #[error("diff error: {0}")]
    Diff(#[from] gv_diff::DiffError),

    /// The two sides changed the same paths in incompatible ways.
    #[error("merge has {} conflict(s)", .0.conflicts.len())]
    Conflicts(ConflictsReport),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
