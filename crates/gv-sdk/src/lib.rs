//! High-level SDK for GeoVersion.
//!
//! [`Repository`] ties the object database, refs, tree editing, diff,
//! merge, and patches together behind one API. This is the main entry point
//! for applications embedding GeoVersion.
//!
//! # Key Types
//!
//! - [`Repository`] -- working tree, staging, commits, branches, history, diff, merge, patches
//! - [`RepositoryConfig`] -- author identity and tuning, loadable from TOML
//! - [`CommitOptions`] -- message, tree, and author of a new commit
//! - [`MergeStatus`] -- how a merge moved `HEAD`
//! - [`Status`] -- staged and unstaged changes

pub mod commit;
pub mod config;
pub mod error;
pub mod repository;
pub mod status;

pub use commit::{CommitOptions, MergeStatus};
pub use config::RepositoryConfig;
pub use error::{SdkError, SdkResult};
pub use repository::Repository;
pub use status::Status;

// Re-export key types
pub use gv_diff::{ChangeType, DiffEntry, DiffObjectCount, FeatureDiff};
pub use gv_merge::ConflictsReport;
pub use gv_patch::{read_patch, write_patch, Patch};
pub use gv_store::{PropertyDescriptor, RevCommit, RevFeature, RevFeatureType, RevTree};
pub use gv_types::{FieldType, Geometry, ObjectId, Value};
