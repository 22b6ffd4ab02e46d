//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// A reference with this name already exists.
    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    /// The ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Following symbolic refs from `name` never reached a direct ref.
    #[error("symbolic ref loop at {name}")]
    SymbolicLoop { name: String },

    /// Cannot delete the branch HEAD points to.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
