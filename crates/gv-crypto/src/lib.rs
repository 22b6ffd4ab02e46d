//! Canonical hashing for GeoVersion.
//!
//! Every revision object is identified by the SHA-1 digest of a fixed,
//! field-by-field byte stream (the "funnel"). This crate owns the primitive
//! encodings of that stream; the per-object field order lives with the object
//! model in `gv-store`.
//!
//! All crypto operations wrap the `sha1` crate; there is no custom digest code.

pub mod funnel;

pub use funnel::{Funnel, ObjectHasher, NULL_BYTE_CODE};
