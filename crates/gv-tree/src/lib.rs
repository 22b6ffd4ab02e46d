//! Tree construction, search, and traversal for GeoVersion.
//!
//! Trees are immutable once built. This crate provides the mutable side:
//! a builder that normalizes a set of children into the canonical leaf or
//! bucketed form, an editor for edits addressed by full path, and the
//! read-side helpers that resolve paths and walk trees lazily.
//!
//! # Key Types
//!
//! - [`RevTreeBuilder`] -- buffered single-level builder with normalization
//! - [`TreeEditor`] -- multi-level path edits written bottom-up
//! - [`DepthSearch`] -- path and child lookup through buckets
//! - [`DepthTreeIterator`] -- pull-based traversal with [`Strategy`] and [`NodeFilter`]

pub mod builder;
pub mod config;
pub mod editor;
pub mod error;
pub mod iterator;
pub mod search;

pub use builder::RevTreeBuilder;
pub use config::TreeConfig;
pub use editor::TreeEditor;
pub use error::{TreeError, TreeResult};
pub use iterator::{BoundsFilter, DepthTreeIterator, NodeFilter, Strategy};
pub use search::DepthSearch;
