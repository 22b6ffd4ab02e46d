//! Error types for the commit graph.

use gv_types::ObjectId;

/// Errors that can occur while walking commit history.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit is not in the graph.
    #[error("commit not found: {0}")]
    NotFound(ObjectId),

    /// A commit references a parent the graph does not hold.
    #[error("dangling parent reference: commit {node} references missing parent {parent}")]
    DanglingParent {
        /// The commit containing the bad reference.
        node: ObjectId,
        /// The missing parent.
        parent: ObjectId,
    },

    /// A commit was registered twice with different parents.
    #[error("commit {0} already recorded with different parents")]
    ConflictingParents(ObjectId),

    /// The operation was canceled through its progress listener.
    #[error("operation canceled")]
    Canceled,

    /// Invalid search configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
