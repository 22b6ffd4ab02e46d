use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use gv_types::{Envelope, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::hash;
use crate::node::Node;
use crate::storage_order;

/// A bucket slot of a bucketed tree: the id of the subtree holding every
/// child whose name hashes to this slot, and the union of their bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: ObjectId,
    pub bounds: Option<Envelope>,
}

impl Bucket {
    pub fn new(id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self { id, bounds }
    }
}

/// An immutable node of the sharded hash-trie.
///
/// A tree is either a leaf holding its direct children in canonical storage
/// order, or a bucketed tree mapping bucket indices to subtrees one level
/// deeper. The empty tree is neither.
///
/// - `size` counts every feature reachable below this tree.
/// - `num_trees` counts every tree node reachable below this tree.
/// - `child_count` counts the direct children of the logical tree, summed
///   across buckets; it decides between leaf and bucket form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevTree {
    #[serde(skip)]
    id: ObjectId,
    size: u64,
    num_trees: u64,
    child_count: u64,
    children: Vec<Node>,
    buckets: BTreeMap<u32, Bucket>,
}

impl RevTree {
    /// The canonical empty tree.
    pub fn empty() -> &'static RevTree {
        static EMPTY: OnceLock<RevTree> = OnceLock::new();
        EMPTY.get_or_init(|| RevTree::leaf(Vec::new(), 0, 0))
    }

    /// Id of the canonical empty tree.
    pub fn empty_id() -> ObjectId {
        Self::empty().id()
    }

    /// A leaf tree. Children are sorted into storage order.
    pub fn leaf(mut children: Vec<Node>, size: u64, num_trees: u64) -> Self {
        storage_order::sort_nodes(&mut children);
        let tree = Self {
            id: ObjectId::NULL,
            size,
            num_trees,
            child_count: children.len() as u64,
            children,
            buckets: BTreeMap::new(),
        };
        tree.rehash()
    }

    /// A bucketed tree.
    pub fn bucketed(
        buckets: BTreeMap<u32, Bucket>,
        size: u64,
        num_trees: u64,
        child_count: u64,
    ) -> Self {
        let tree = Self {
            id: ObjectId::NULL,
            size,
            num_trees,
            child_count,
            children: Vec::new(),
            buckets,
        };
        tree.rehash()
    }

    /// Reassemble a decoded tree, rejecting a mix of children and buckets.
    pub fn from_parts(
        size: u64,
        num_trees: u64,
        child_count: u64,
        children: Vec<Node>,
        buckets: BTreeMap<u32, Bucket>,
    ) -> StoreResult<Self> {
        if !children.is_empty() && !buckets.is_empty() {
            return Err(StoreError::InvalidTree(
                "tree holds both children and buckets".into(),
            ));
        }
        if buckets.is_empty() {
            if child_count != children.len() as u64 {
                return Err(StoreError::InvalidTree(format!(
                    "leaf declares {child_count} children but holds {}",
                    children.len()
                )));
            }
            Ok(Self::leaf(children, size, num_trees))
        } else {
            Ok(Self::bucketed(buckets, size, num_trees, child_count))
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn num_trees(&self) -> u64 {
        self.num_trees
    }

    pub fn child_count(&self) -> u64 {
        self.child_count
    }

    /// Direct children of a leaf tree, in storage order. Empty for a
    /// bucketed tree.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn buckets(&self) -> &BTreeMap<u32, Bucket> {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.buckets.is_empty()
    }

    pub fn has_buckets(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Direct feature children of a leaf tree.
    pub fn features(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|n| n.is_feature())
    }

    /// Direct tree children of a leaf tree.
    pub fn trees(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|n| n.is_tree())
    }

    /// Union of the bounds of every child or bucket.
    pub fn bounds(&self) -> Option<Envelope> {
        let from_children = self
            .children
            .iter()
            .fold(None, |acc, n| Envelope::merge(acc, n.bounds()));
        self.buckets
            .values()
            .fold(from_children, |acc, b| Envelope::merge(acc, b.bounds.as_ref()))
    }

    pub(crate) fn rehash(mut self) -> Self {
        self.id = hash::tree_id(&self);
        self
    }
}

impl PartialEq for RevTree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RevTree {}

impl fmt::Display for RevTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree[{}; size={}, trees={}, {}]",
            self.id.short_hex(),
            self.size,
            self.num_trees,
            if self.has_buckets() {
                format!("{} buckets", self.buckets.len())
            } else {
                format!("{} children", self.children.len())
            }
        )
    }
}
