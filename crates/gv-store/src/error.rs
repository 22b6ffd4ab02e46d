use gv_types::{ObjectId, ObjectType, TypeError};

/// Errors from the object model and object database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but is of a different kind than requested.
    #[error("object {id} is a {actual}, expected {expected}")]
    UnexpectedType {
        id: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    /// The stored bytes do not decode to the object they are keyed under.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Attempted to store an object under the null id.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// A node violates its construction invariants.
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// A tree violates its structural invariants.
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// A commit builder is missing a required field.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
