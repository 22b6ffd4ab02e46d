//! Error types for the patch crate.

use crate::patch::Patch;

/// Errors that can occur while creating, reading, or applying patches.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] gv_tree::TreeError),

    #[error("diff error: {0}")]
    Diff(#[from] gv_diff::DiffError),

    /// Malformed patch text.
    #[error("malformed patch: {0}")]
    Parse(String),

    /// A feature without a feature type cannot be carried by a patch.
    #[error("feature '{0}' has no feature type")]
    MissingFeatureType(String),

    /// Some changes do not apply to the target tree. Carries the rejected
    /// part of the patch.
    #[error("patch does not apply: {} rejected change(s)", .0.count())]
    CannotApply(Patch),
}

/// Convenience alias for patch results.
pub type PatchResult<T> = Result<T, PatchError>;
