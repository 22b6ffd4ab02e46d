//! Revision object model and object database for GeoVersion.
//!
//! Every piece of versioned data -- commits, trees, features, feature types,
//! tags -- is an immutable object identified by the SHA-1 of its canonical
//! field funnel (see [`hash`]). Trees form a sharded hash-trie: a tree is
//! either a leaf of at most [`NORMALIZED_SIZE_LIMIT`] children in storage
//! order, or a map of up to [`MAX_BUCKETS`] bucket subtrees.
//!
//! # Key Types
//!
//! - [`RevObject`] -- closed sum of [`RevCommit`], [`RevTree`], [`RevFeature`],
//!   [`RevFeatureType`], [`RevTag`]
//! - [`Node`] / [`NodeRef`] -- named child pointers and their resolved paths
//! - [`ObjectDatabase`] -- content-addressed key/value store with typed access
//! - [`SerializationFactory`] -- codec used by a database
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectDatabase`] -- `HashMap`-based database for tests and embedding

pub mod commit;
pub mod error;
pub mod feature;
pub mod hash;
pub mod memory;
pub mod node;
pub mod object;
pub mod serialization;
pub mod storage_order;
pub mod text;
pub mod traits;
pub mod tree;

// Re-export primary types at crate root for ergonomic imports.
pub use commit::{CommitBuilder, RevCommit, RevPerson};
pub use error::{StoreError, StoreResult};
pub use feature::{PropertyDescriptor, RevFeature, RevFeatureType};
pub use hash::hash_object;
pub use memory::InMemoryObjectDatabase;
pub use node::{Node, NodeRef, NodeType};
pub use object::{RevObject, RevTag};
pub use serialization::{BincodeSerializationFactory, SerializationFactory};
pub use storage_order::{MAX_BUCKETS, MAX_DEPTH, NORMALIZED_SIZE_LIMIT};
pub use text::TextSerializationFactory;
pub use traits::ObjectDatabase;
pub use tree::{Bucket, RevTree};
