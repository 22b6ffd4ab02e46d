//! Error types for the tree crate.

/// Errors that can occur while building, searching, or editing trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),

    /// A path is malformed for the requested operation.
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    /// A path that must name a tree names a feature.
    #[error("not a tree: '{0}'")]
    NotATree(String),

    /// The operation was canceled through its progress listener.
    #[error("operation canceled")]
    Canceled,

    /// A caller violated an operation precondition.
    #[error("precondition failed: {0}")]
    Precondition(String),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
