use gv_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("refspec did not resolve: {0}")]
    NotFound(String),

    #[error("refspec '{refspec}' matches more than one object: {}", .matches.len())]
    AmbiguousRefspec {
        refspec: String,
        matches: Vec<ObjectId>,
    },

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("no common ancestor between {0} and {1}")]
    NoCommonAncestor(ObjectId, ObjectId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] gv_store::StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] gv_tree::TreeError),

    #[error("diff error: {0}")]
    Diff(#[from] gv_diff::DiffError),

    #[error("history error: {0}")]
    Dag(#[from] gv_dag::DagError),

    #[error("merge error: {0}")]
    Merge(#[from] gv_merge::MergeError),

    #[error("patch error: {0}")]
    Patch(#[from] gv_patch::PatchError),

    #[error("ref error: {0}")]
    Ref(#[from] gv_refs::RefError),
}

pub type SdkResult<T> = Result<T, SdkError>;
