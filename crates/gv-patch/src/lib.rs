//! Patches for GeoVersion.
//!
//! A patch captures the changes between two trees in a self-contained form:
//! whole features for additions and removals, attribute diffs for
//! modifications, and the feature types all of them refer to. Patches are
//! written to and read from a line-oriented text format and can be applied
//! to any tree the changes fit, forwards or in reverse.
//!
//! # Key Types
//!
//! - [`Patch`] -- the set of feature and tree changes
//! - [`ApplyPatch`] -- checked, optionally partial or reversed application
//! - [`PatchCheck`] -- the applicable and rejected parts of a patch
//! - [`PatchError`] -- error type for patch operations

pub mod apply;
pub mod create;
pub mod error;
pub mod patch;
pub mod serializer;

pub use apply::{apply_patch, AppliedPatch, ApplyPatch, PatchCheck};
pub use create::create_patch;
pub use error::{PatchError, PatchResult};
pub use patch::{AlteredTree, Patch, PatchFeature};
pub use serializer::{read_patch, write_patch};
