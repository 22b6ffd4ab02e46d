//! Change counts between two trees without materializing diff entries.
//!
//! The counter follows the same level-by-level dispatch as the tree diff
//! walk, but whole added or removed subtrees are counted from their stored
//! `size` and `num_trees` instead of being enumerated.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign};

use gv_store::storage_order;
use gv_store::{Node, ObjectDatabase, RevTree};
use gv_types::ProgressListener;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffError, DiffResult};
use crate::tree_diff::{differing_slots, load_slot};

/// Number of changed tree and feature nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffObjectCount {
    pub trees: u64,
    pub features: u64,
}

impl DiffObjectCount {
    pub fn new(trees: u64, features: u64) -> Self {
        Self { trees, features }
    }

    pub fn total(&self) -> u64 {
        self.trees + self.features
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl Add for DiffObjectCount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            trees: self.trees + other.trees,
            features: self.features + other.features,
        }
    }
}

impl AddAssign for DiffObjectCount {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl fmt::Display for DiffObjectCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} trees, {} features changed", self.trees, self.features)
    }
}

/// Counts added, removed, and modified nodes between two trees.
///
/// Every changed tree node counts once in `trees`, and every changed feature
/// once in `features`, matching the entries a tree diff reports with tree
/// reporting enabled.
pub struct DiffCounter<'a> {
    db: &'a dyn ObjectDatabase,
    listener: Option<&'a dyn ProgressListener>,
}

impl<'a> DiffCounter<'a> {
    pub fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self { db, listener: None }
    }

    /// Honour cancellation from `listener` at every tree level.
    pub fn with_listener(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn count(&self, old: &RevTree, new: &RevTree) -> DiffResult<DiffObjectCount> {
        let count = self.count_level(old, new, 0)?;
        debug!(
            old = %old.id().short_hex(),
            new = %new.id().short_hex(),
            trees = count.trees,
            features = count.features,
            "counted differences"
        );
        Ok(count)
    }

    fn count_level(&self, left: &RevTree, right: &RevTree, depth: usize) -> DiffResult<DiffObjectCount> {
        if self.listener.is_some_and(|l| l.is_canceled()) {
            return Err(DiffError::Canceled);
        }
        if left.id() == right.id() {
            return Ok(DiffObjectCount::default());
        }
        if left.is_empty() {
            return self.whole(right);
        }
        if right.is_empty() {
            return self.whole(left);
        }
        if !left.has_buckets() && !right.has_buckets() {
            return self.count_children(left.children(), right.children());
        }
        let mut count = DiffObjectCount::default();
        for (l, r) in differing_slots(left, right, depth) {
            let l = load_slot(self.db, l)?;
            let r = load_slot(self.db, r)?;
            count += self.count_level(&l, &r, depth + 1)?;
        }
        Ok(count)
    }

    /// Every node in `tree`, counted without enumeration where possible.
    fn whole(&self, tree: &RevTree) -> DiffResult<DiffObjectCount> {
        if tree.has_buckets() {
            return Ok(DiffObjectCount::new(tree.num_trees(), tree.size()));
        }
        let mut count = DiffObjectCount::default();
        for node in tree.children() {
            count += self.whole_node(node)?;
        }
        Ok(count)
    }

    fn whole_node(&self, node: &Node) -> DiffResult<DiffObjectCount> {
        if !node.is_tree() {
            return Ok(DiffObjectCount::new(0, 1));
        }
        let subtree = self.db.get_tree(&node.object_id())?;
        Ok(DiffObjectCount::new(1 + subtree.num_trees(), subtree.size()))
    }

    fn count_children(&self, l: &[Node], r: &[Node]) -> DiffResult<DiffObjectCount> {
        let mut count = DiffObjectCount::default();
        let (mut i, mut j) = (0, 0);
        while i < l.len() || j < r.len() {
            let order = match (l.get(i), r.get(j)) {
                (Some(a), Some(b)) => storage_order::compare_nodes(a, b),
                (Some(_), None) => Ordering::Less,
                _ => Ordering::Greater,
            };
            match order {
                Ordering::Less => {
                    count += self.whole_node(&l[i])?;
                    i += 1;
                }
                Ordering::Greater => {
                    count += self.whole_node(&r[j])?;
                    j += 1;
                }
                Ordering::Equal => {
                    let (a, b) = (&l[i], &r[j]);
                    if a != b {
                        if a.node_type() != b.node_type() {
                            count += self.whole_node(a)?;
                            count += self.whole_node(b)?;
                        } else if a.is_tree() {
                            count.trees += 1;
                            let old = self.db.get_tree(&a.object_id())?;
                            let new = self.db.get_tree(&b.object_id())?;
                            count += self.count_level(&old, &new, 0)?;
                        } else {
                            count.features += 1;
                        }
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DiffEntry;
    use crate::tree_diff::TreeDiffEntryIterator;
    use gv_store::InMemoryObjectDatabase;
    use gv_tree::TreeEditor;
    use gv_types::{DefaultProgressListener, ObjectId};

    fn fid(s: &str) -> ObjectId {
        ObjectId::for_string(s)
    }

    fn edit(
        db: &InMemoryObjectDatabase,
        base: &RevTree,
        puts: impl IntoIterator<Item = (String, String)>,
        removes: &[&str],
    ) -> RevTree {
        let mut editor = TreeEditor::new(db, base.clone());
        for (path, version) in puts {
            editor.put_feature(&path, fid(&version), ObjectId::NULL, None).unwrap();
        }
        for path in removes {
            editor.remove(path).unwrap();
        }
        editor.write().unwrap()
    }

    fn iterated(db: &InMemoryObjectDatabase, a: &RevTree, b: &RevTree) -> DiffObjectCount {
        let entries: Vec<DiffEntry> = TreeDiffEntryIterator::new(db, a, b, true)
            .map(|e| e.unwrap())
            .collect();
        DiffObjectCount::new(
            entries.iter().filter(|e| e.is_tree()).count() as u64,
            entries.iter().filter(|e| e.is_feature()).count() as u64,
        )
    }

    #[test]
    fn counts_match_the_diff_walk() {
        let db = InMemoryObjectDatabase::new();
        let empty = RevTree::empty().clone();
        let base = edit(
            &db,
            &empty,
            (0..700)
                .map(|i| (format!("roads/r{i}"), "v1".to_string()))
                .chain((0..20).map(|i| (format!("rivers/w{i}"), "v1".to_string()))),
            &[],
        );
        let changed = edit(
            &db,
            &base,
            (0..5)
                .map(|i| (format!("roads/r{i}"), "v2".to_string()))
                .chain((0..3).map(|i| (format!("lakes/deep/l{i}"), "v1".to_string()))),
            &["rivers", "roads/r600"],
        );

        let counter = DiffCounter::new(&db);
        let count = counter.count(&base, &changed).unwrap();
        assert_eq!(count, iterated(&db, &base, &changed));
        // roads, lakes, lakes/deep, rivers
        assert_eq!(count.trees, 4);
        // 5 modified + 1 removed road, 3 lakes, 20 rivers
        assert_eq!(count.features, 29);

        assert_eq!(counter.count(&changed, &base).unwrap(), count);
        assert!(counter.count(&base, &base).unwrap().is_empty());
    }

    #[test]
    fn wholesale_counts_use_stored_sizes() {
        let db = InMemoryObjectDatabase::new();
        let empty = RevTree::empty().clone();
        let big = edit(
            &db,
            &empty,
            (0..900).map(|i| (format!("l{}/f{i}", i % 3), "v".to_string())),
            &[],
        );
        let count = DiffCounter::new(&db).count(&empty, &big).unwrap();
        assert_eq!(count, DiffObjectCount::new(3, 900));
        assert_eq!(count.total(), 903);
    }

    #[test]
    fn canceled_counts_fail() {
        let db = InMemoryObjectDatabase::new();
        let empty = RevTree::empty().clone();
        let a = edit(&db, &empty, (0..600).map(|i| (format!("f{i}"), "v1".to_string())), &[]);
        let b = edit(&db, &a, (0..600).map(|i| (format!("f{i}"), "v2".to_string())), &[]);
        let listener = DefaultProgressListener::new();
        let counter = DiffCounter::new(&db).with_listener(&listener);
        assert_eq!(counter.count(&a, &b).unwrap(), DiffObjectCount::new(0, 600));
        listener.cancel();
        assert!(matches!(counter.count(&a, &b), Err(DiffError::Canceled)));
    }
}
