//! Reference management for GeoVersion.
//!
//! Refs are the human-readable entry points into history: branches and tags
//! under `refs/`, plus a few well-known pointers such as `HEAD` (usually a
//! symbolic ref naming the current branch), `WORK_HEAD` and `STAGE_HEAD`
//! (root trees of the working tree and staging area).
//!
//! # Key Types
//!
//! - [`Ref`] -- a direct or symbolic reference
//! - [`RefDatabase`] -- the storage interface, with symbolic resolution
//! - [`InMemoryRefDatabase`] -- in-memory implementation
//! - [`RefError`] -- error type for ref operations

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use memory::InMemoryRefDatabase;
pub use names::{validate_branch_name, validate_ref_name, validate_tag_name};
pub use traits::RefDatabase;
pub use types::Ref;
