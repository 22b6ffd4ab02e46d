//! Mutable construction of [`RevTree`]s.
//!
//! A builder buffers changes by child name and normalizes them into the
//! canonical form on `build()`:
//!
//! - a tree whose direct children number at most [`NORMALIZED_SIZE_LIMIT`]
//!   (or which sits at [`MAX_DEPTH`]) is a leaf;
//! - any other tree is split into bucket subtrees by the storage-order bucket
//!   of each child name at the tree's depth.
//!
//! Because the form depends only on the final set of children, two builders
//! that end with the same children produce the same tree id regardless of the
//! order their changes were applied in.

use std::collections::BTreeMap;
use std::mem;

use gv_store::storage_order::{self, MAX_DEPTH, NORMALIZED_SIZE_LIMIT};
use gv_store::{Bucket, Node, ObjectDatabase, RevObject, RevTree};
use tracing::{debug, trace};

use crate::config::TreeConfig;
use crate::error::TreeResult;
use crate::search::DepthSearch;

/// Builder for a single tree level.
///
/// In leaf mode `entries` holds every child plus pending changes. In bucket
/// mode `entries` holds only pending changes; the rest of the children live
/// in the bucket subtrees, whose totals are tracked in `size`, `num_trees`,
/// and `child_count`.
pub struct RevTreeBuilder<'a> {
    db: &'a dyn ObjectDatabase,
    config: TreeConfig,
    depth: usize,
    entries: BTreeMap<String, Node>,
    buckets: BTreeMap<u32, Bucket>,
    size: u64,
    num_trees: u64,
    child_count: u64,
}

impl<'a> RevTreeBuilder<'a> {
    /// A builder for a new, empty root tree.
    pub fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self::from_tree(db, RevTree::empty())
    }

    /// A builder starting from the contents of `tree`, a root tree.
    pub fn from_tree(db: &'a dyn ObjectDatabase, tree: &RevTree) -> Self {
        Self::at_depth(db, tree, 0, TreeConfig::default())
    }

    /// A builder for `tree` at bucket depth `depth`.
    pub fn at_depth(
        db: &'a dyn ObjectDatabase,
        tree: &RevTree,
        depth: usize,
        config: TreeConfig,
    ) -> Self {
        let entries = tree
            .children()
            .iter()
            .map(|n| (n.name().to_string(), n.clone()))
            .collect();
        let (size, num_trees, child_count) = if tree.has_buckets() {
            (tree.size(), tree.num_trees(), tree.child_count())
        } else {
            (0, 0, 0)
        };
        Self {
            db,
            config,
            depth,
            entries,
            buckets: tree.buckets().clone(),
            size,
            num_trees,
            child_count,
        }
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of buffered entries (children in leaf mode, pending changes in
    /// bucket mode).
    pub fn buffered(&self) -> usize {
        self.entries.len()
    }

    /// Insert or replace the child called `node.name()`.
    ///
    /// A node with a NULL object id is a tombstone and removes the child.
    pub fn put(&mut self, node: Node) -> TreeResult<()> {
        self.entries.insert(node.name().to_string(), node);
        if self.entries.len() >= self.config.split_threshold {
            self.normalize()?;
        }
        Ok(())
    }

    /// Remove the child called `name`. Removing a missing child is a no-op.
    pub fn remove(&mut self, name: &str) -> TreeResult<()> {
        self.put(Node::tombstone(name))
    }

    /// The current child called `name`, seeing pending changes first.
    pub fn get(&self, name: &str) -> TreeResult<Option<Node>> {
        if let Some(node) = self.entries.get(name) {
            return Ok((!node.is_tombstone()).then(|| node.clone()));
        }
        if self.buckets.is_empty() {
            return Ok(None);
        }
        let index = storage_order::bucket(name, self.depth);
        match self.buckets.get(&index) {
            Some(bucket) => {
                let subtree = self.db.get_tree(&bucket.id)?;
                DepthSearch::new(self.db).find_child_at(&subtree, name, self.depth + 1)
            }
            None => Ok(None),
        }
    }

    /// Normalize, then produce the immutable tree. Bucket subtrees are
    /// written to the database; the returned tree itself is not.
    pub fn build(mut self) -> TreeResult<RevTree> {
        self.normalize()?;
        if self.buckets.is_empty() {
            let children: Vec<Node> = mem::take(&mut self.entries).into_values().collect();
            let (size, num_trees) = self.leaf_totals(&children)?;
            let tree = RevTree::leaf(children, size, num_trees);
            trace!(tree = %tree.id().short_hex(), depth = self.depth, size, "built leaf");
            Ok(tree)
        } else {
            let tree = RevTree::bucketed(
                mem::take(&mut self.buckets),
                self.size,
                self.num_trees,
                self.child_count,
            );
            trace!(tree = %tree.id().short_hex(), depth = self.depth, size = self.size, "built bucketed tree");
            Ok(tree)
        }
    }

    fn leaf_totals(&self, children: &[Node]) -> TreeResult<(u64, u64)> {
        let mut size = 0;
        let mut num_trees = 0;
        for node in children {
            if node.is_tree() {
                let subtree = self.db.get_tree(&node.object_id())?;
                size += subtree.size();
                num_trees += 1 + subtree.num_trees();
            } else {
                size += 1;
            }
        }
        Ok((size, num_trees))
    }

    /// Bring buffered changes into canonical form.
    pub fn normalize(&mut self) -> TreeResult<()> {
        if self.buckets.is_empty() {
            self.entries.retain(|_, n| !n.is_tombstone());
            if self.entries.len() <= NORMALIZED_SIZE_LIMIT || self.depth >= MAX_DEPTH {
                return Ok(());
            }
            debug!(depth = self.depth, children = self.entries.len(), "splitting tree into buckets");
        }
        self.move_entries_to_buckets()?;
        if self.child_count <= NORMALIZED_SIZE_LIMIT as u64 {
            self.collapse_to_leaf()?;
        }
        Ok(())
    }

    fn move_entries_to_buckets(&mut self) -> TreeResult<()> {
        let mut by_bucket: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
        for (name, node) in mem::take(&mut self.entries) {
            by_bucket
                .entry(storage_order::bucket(&name, self.depth))
                .or_default()
                .push(node);
        }
        for (index, nodes) in by_bucket {
            let previous = match self.buckets.get(&index) {
                Some(bucket) => self.db.get_tree(&bucket.id)?,
                None => RevTree::empty().clone(),
            };
            let mut sub =
                RevTreeBuilder::at_depth(self.db, &previous, self.depth + 1, self.config.clone());
            for node in nodes {
                sub.entries.insert(node.name().to_string(), node);
            }
            let rebuilt = sub.build()?;

            self.size = self.size - previous.size() + rebuilt.size();
            self.num_trees = self.num_trees - previous.num_trees() + rebuilt.num_trees();
            self.child_count = self.child_count - previous.child_count() + rebuilt.child_count();

            if rebuilt.is_empty() {
                self.buckets.remove(&index);
            } else {
                let bucket = Bucket::new(rebuilt.id(), rebuilt.bounds());
                self.db.put(&RevObject::Tree(rebuilt))?;
                self.buckets.insert(index, bucket);
            }
        }
        Ok(())
    }

    fn collapse_to_leaf(&mut self) -> TreeResult<()> {
        debug!(depth = self.depth, children = self.child_count, "collapsing buckets into leaf");
        let mut children = Vec::new();
        for bucket in mem::take(&mut self.buckets).values() {
            let subtree = self.db.get_tree(&bucket.id)?;
            collect_direct_children(self.db, &subtree, &mut children)?;
        }
        self.entries = children
            .into_iter()
            .map(|n| (n.name().to_string(), n))
            .collect();
        self.size = 0;
        self.num_trees = 0;
        self.child_count = 0;
        Ok(())
    }
}

fn collect_direct_children(
    db: &dyn ObjectDatabase,
    tree: &RevTree,
    out: &mut Vec<Node>,
) -> TreeResult<()> {
    out.extend(tree.children().iter().cloned());
    for bucket in tree.buckets().values() {
        let subtree = db.get_tree(&bucket.id)?;
        collect_direct_children(db, &subtree, out)?;
    }
    Ok(())
}
