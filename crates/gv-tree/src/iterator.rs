//! Lazy depth-first iteration over stored trees.
//!
//! [`DepthTreeIterator`] hides the leaf/bucket split: bucket subtrees are
//! fetched from the database as the iterator reaches them, and callers only
//! ever see named [`NodeRef`]s. Traversal state lives in an explicit stack of
//! frames, so deep trees never grow the call stack.

use std::vec;

use gv_store::{Bucket, Node, NodeRef, ObjectDatabase, RevTree};
use gv_types::{Envelope, ObjectId};

use crate::error::TreeResult;

/// Which nodes an iterator yields, and whether it descends into subtrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Direct children of the starting tree.
    Children,
    /// Direct feature children.
    FeaturesOnly,
    /// Direct tree children.
    TreesOnly,
    /// Every node below the starting tree, trees before their contents.
    Recursive,
    /// Every feature below the starting tree.
    RecursiveFeaturesOnly,
    /// Every tree below the starting tree.
    RecursiveTreesOnly,
}

impl Strategy {
    pub fn is_recursive(&self) -> bool {
        matches!(
            self,
            Strategy::Recursive | Strategy::RecursiveFeaturesOnly | Strategy::RecursiveTreesOnly
        )
    }

    fn yields(&self, node: &NodeRef) -> bool {
        match self {
            Strategy::Children | Strategy::Recursive => true,
            Strategy::FeaturesOnly | Strategy::RecursiveFeaturesOnly => node.is_feature(),
            Strategy::TreesOnly | Strategy::RecursiveTreesOnly => node.is_tree(),
        }
    }
}

/// Prunes nodes and whole bucket subtrees during iteration.
///
/// A rejected tree node is neither yielded nor descended into. A rejected
/// bucket is skipped without being loaded.
pub trait NodeFilter {
    fn accept_node(&self, node: &NodeRef) -> bool;

    fn accept_bucket(&self, bucket: &Bucket) -> bool;
}

/// Keeps nodes and buckets whose bounds intersect an envelope.
///
/// Entries without bounds are always kept.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsFilter {
    envelope: Envelope,
}

impl BoundsFilter {
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope }
    }

    fn accept(&self, bounds: Option<&Envelope>) -> bool {
        bounds.map_or(true, |b| b.intersects(&self.envelope))
    }
}

impl NodeFilter for BoundsFilter {
    fn accept_node(&self, node: &NodeRef) -> bool {
        self.accept(node.bounds())
    }

    fn accept_bucket(&self, bucket: &Bucket) -> bool {
        self.accept(bucket.bounds.as_ref())
    }
}

enum Frame {
    Nodes {
        parent_path: String,
        metadata_id: ObjectId,
        nodes: vec::IntoIter<Node>,
    },
    Buckets {
        parent_path: String,
        metadata_id: ObjectId,
        buckets: vec::IntoIter<Bucket>,
    },
}

impl Frame {
    fn of(tree: &RevTree, parent_path: String, metadata_id: ObjectId) -> Self {
        if tree.has_buckets() {
            Frame::Buckets {
                parent_path,
                metadata_id,
                buckets: tree.buckets().values().cloned().collect::<Vec<_>>().into_iter(),
            }
        } else {
            Frame::Nodes {
                parent_path,
                metadata_id,
                nodes: tree.children().to_vec().into_iter(),
            }
        }
    }
}

/// Pull-based iterator over the nodes of a tree.
///
/// Not restartable: create a new iterator to walk the tree again. Yields an
/// error (and then keeps going) when a subtree cannot be loaded.
pub struct DepthTreeIterator<'a> {
    db: &'a dyn ObjectDatabase,
    strategy: Strategy,
    filter: Option<Box<dyn NodeFilter + 'a>>,
    stack: Vec<Frame>,
}

impl<'a> DepthTreeIterator<'a> {
    /// Iterate `tree` as a root tree.
    pub fn new(db: &'a dyn ObjectDatabase, tree: &RevTree, strategy: Strategy) -> Self {
        Self::at(db, tree, "", ObjectId::NULL, strategy)
    }

    /// Iterate `tree` as the tree found at `parent_path`, whose children
    /// inherit `metadata_id` when they carry none of their own.
    pub fn at(
        db: &'a dyn ObjectDatabase,
        tree: &RevTree,
        parent_path: impl Into<String>,
        metadata_id: ObjectId,
        strategy: Strategy,
    ) -> Self {
        Self {
            db,
            strategy,
            filter: None,
            stack: vec![Frame::of(tree, parent_path.into(), metadata_id)],
        }
    }

    pub fn with_filter(mut self, filter: impl NodeFilter + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn push_stored(
        &mut self,
        id: &ObjectId,
        parent_path: String,
        metadata_id: ObjectId,
    ) -> TreeResult<()> {
        let tree = self.db.get_tree(id)?;
        self.stack.push(Frame::of(&tree, parent_path, metadata_id));
        Ok(())
    }
}

impl Iterator for DepthTreeIterator<'_> {
    type Item = TreeResult<NodeRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame {
                Frame::Nodes {
                    parent_path,
                    metadata_id,
                    nodes,
                } => {
                    let Some(node) = nodes.next() else {
                        self.stack.pop();
                        continue;
                    };
                    let node_ref = NodeRef::new(node, parent_path.clone(), *metadata_id);
                    if let Some(filter) = &self.filter {
                        if !filter.accept_node(&node_ref) {
                            continue;
                        }
                    }
                    if node_ref.is_tree() && self.strategy.is_recursive() {
                        if let Err(e) = self.push_stored(
                            &node_ref.object_id(),
                            node_ref.path(),
                            node_ref.metadata_id(),
                        ) {
                            return Some(Err(e));
                        }
                    }
                    if self.strategy.yields(&node_ref) {
                        return Some(Ok(node_ref));
                    }
                }
                Frame::Buckets {
                    parent_path,
                    metadata_id,
                    buckets,
                } => {
                    let Some(bucket) = buckets.next() else {
                        self.stack.pop();
                        continue;
                    };
                    let parent_path = parent_path.clone();
                    let metadata_id = *metadata_id;
                    if let Some(filter) = &self.filter {
                        if !filter.accept_bucket(&bucket) {
                            continue;
                        }
                    }
                    if let Err(e) = self.push_stored(&bucket.id, parent_path, metadata_id) {
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}
