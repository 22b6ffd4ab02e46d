//! Error types for the diff crate.

/// Errors that can occur while computing or applying diffs.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),

    /// Tree search or iteration failed.
    #[error("tree error: {0}")]
    Tree(#[from] gv_tree::TreeError),

    /// A value or geometry could not be parsed.
    #[error("type error: {0}")]
    Type(#[from] gv_types::TypeError),

    /// A diff entry was constructed from an invalid pair of nodes.
    #[error("invalid diff entry: {0}")]
    InvalidDiffEntry(String),

    /// A diff does not apply to the value it was offered.
    #[error("diff cannot be applied: {0}")]
    CannotApply(String),

    /// The walk was canceled through its progress listener.
    #[error("diff canceled")]
    Canceled,

    /// Malformed diff text.
    #[error("malformed diff text: {0}")]
    Parse(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
