use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("invalid {field_type} value '{text}'")]
    InvalidValue { field_type: String, text: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
