//! Structural diff between two trees.
//!
//! The walk compares one tree level at a time and dispatches on the shape of
//! the two sides:
//!
//! - equal ids: nothing below differs, the level is skipped;
//! - one side empty: everything on the other side is added or removed;
//! - two leaves: a merge of the two child lists in storage order;
//! - anything bucketed: both sides are split by bucket index at the current
//!   depth (a leaf side is grouped with the same bucket function) and each
//!   bucket pair is compared one level deeper.
//!
//! Pending work lives on an explicit stack, so entries are produced lazily.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use gv_store::storage_order;
use gv_store::{Node, NodeRef, ObjectDatabase, RevTree};
use gv_tree::{DepthTreeIterator, Strategy};
use gv_types::{ObjectId, ProgressListener};
use tracing::trace;

use crate::entry::{ChangeType, DiffEntry};
use crate::error::{DiffError, DiffResult};

/// A tree level together with the path and inherited metadata of the
/// logical tree it belongs to.
#[derive(Clone)]
pub(crate) struct Side {
    pub(crate) tree: RevTree,
    pub(crate) path: String,
    pub(crate) metadata_id: ObjectId,
}

impl Side {
    pub(crate) fn root(tree: RevTree) -> Self {
        Self {
            tree,
            path: String::new(),
            metadata_id: ObjectId::NULL,
        }
    }

    fn with_tree(&self, tree: RevTree) -> Self {
        Self {
            tree,
            path: self.path.clone(),
            metadata_id: self.metadata_id,
        }
    }

    fn node_ref(&self, node: &Node) -> NodeRef {
        NodeRef::new(node.clone(), self.path.clone(), self.metadata_id)
    }
}

/// One bucket slot of a tree level: either a stored bucket subtree, loaded
/// on demand, or the group of leaf children that fall into that slot.
pub(crate) enum Slot {
    Stored(ObjectId),
    Grouped(RevTree),
}

impl Slot {
    fn id(&self) -> ObjectId {
        match self {
            Slot::Stored(id) => *id,
            Slot::Grouped(tree) => tree.id(),
        }
    }

    pub(crate) fn load(self, db: &dyn ObjectDatabase) -> DiffResult<RevTree> {
        match self {
            Slot::Stored(id) => Ok(db.get_tree(&id)?),
            Slot::Grouped(tree) => Ok(tree),
        }
    }
}

/// Split a tree level into bucket slots at `depth`.
pub(crate) fn slots(tree: &RevTree, depth: usize) -> BTreeMap<u32, Slot> {
    if tree.has_buckets() {
        return tree
            .buckets()
            .iter()
            .map(|(index, bucket)| (*index, Slot::Stored(bucket.id)))
            .collect();
    }
    let mut groups: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
    for node in tree.children() {
        groups
            .entry(storage_order::bucket(node.name(), depth))
            .or_default()
            .push(node.clone());
    }
    groups
        .into_iter()
        .map(|(index, nodes)| {
            let count = nodes.len() as u64;
            (index, Slot::Grouped(RevTree::leaf(nodes, count, 0)))
        })
        .collect()
}

/// Pairs of slots that differ, with a missing slot read as empty.
pub(crate) fn differing_slots(
    left: &RevTree,
    right: &RevTree,
    depth: usize,
) -> Vec<(Option<Slot>, Option<Slot>)> {
    let mut left = slots(left, depth);
    let mut right = slots(right, depth);
    let indices: BTreeSet<u32> = left.keys().chain(right.keys()).copied().collect();
    let mut out = Vec::new();
    for index in indices {
        let l = left.remove(&index);
        let r = right.remove(&index);
        let same = match (&l, &r) {
            (Some(a), Some(b)) => a.id() == b.id(),
            _ => false,
        };
        if !same {
            out.push((l, r));
        }
    }
    out
}

pub(crate) fn load_slot(db: &dyn ObjectDatabase, slot: Option<Slot>) -> DiffResult<RevTree> {
    match slot {
        Some(slot) => slot.load(db),
        None => Ok(RevTree::empty().clone()),
    }
}

enum Work<'a> {
    Compare {
        left: Side,
        right: Side,
        depth: usize,
    },
    Emit(DiffEntry),
    All {
        nodes: DepthTreeIterator<'a>,
        change: ChangeType,
    },
}

/// Lazy sequence of the differences between two trees.
///
/// Feature changes are always reported. With `report_trees`, every tree
/// node that was added, removed, or changed is reported as well, before the
/// changes below it.
///
/// A canceled listener ends the sequence with a single
/// [`DiffError::Canceled`] at the next tree level.
pub struct TreeDiffEntryIterator<'a> {
    db: &'a dyn ObjectDatabase,
    report_trees: bool,
    listener: Option<&'a dyn ProgressListener>,
    pending: Vec<Work<'a>>,
}

impl<'a> TreeDiffEntryIterator<'a> {
    /// Differences between two root trees.
    pub fn new(
        db: &'a dyn ObjectDatabase,
        old: &RevTree,
        new: &RevTree,
        report_trees: bool,
    ) -> Self {
        let mut it = Self {
            db,
            report_trees,
            listener: None,
            pending: Vec::new(),
        };
        it.pending.push(Work::Compare {
            left: Side::root(old.clone()),
            right: Side::root(new.clone()),
            depth: 0,
        });
        it
    }

    /// Differences below two tree nodes. A missing side reads as an empty
    /// tree at the other side's path. The tree nodes themselves are not
    /// reported.
    pub fn between(
        db: &'a dyn ObjectDatabase,
        old: Option<&NodeRef>,
        new: Option<&NodeRef>,
        report_trees: bool,
    ) -> DiffResult<Self> {
        let side = |node: Option<&NodeRef>, fallback: Option<&NodeRef>| -> DiffResult<Side> {
            match node {
                Some(n) => Ok(Side {
                    tree: db.get_tree(&n.object_id())?,
                    path: n.path(),
                    metadata_id: n.metadata_id(),
                }),
                None => Ok(Side {
                    tree: RevTree::empty().clone(),
                    path: fallback.map(|n| n.path()).unwrap_or_default(),
                    metadata_id: fallback.map_or(ObjectId::NULL, |n| n.metadata_id()),
                }),
            }
        };
        let left = side(old, new)?;
        let right = side(new, old)?;
        Ok(Self {
            db,
            report_trees,
            listener: None,
            pending: vec![Work::Compare {
                left,
                right,
                depth: 0,
            }],
        })
    }

    /// Honour cancellation from `listener` between tree levels.
    pub fn with_listener(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn is_canceled(&self) -> bool {
        self.listener.is_some_and(|l| l.is_canceled())
    }

    fn strategy(&self) -> Strategy {
        if self.report_trees {
            Strategy::Recursive
        } else {
            Strategy::RecursiveFeaturesOnly
        }
    }

    fn whole_side(&self, side: &Side, change: ChangeType) -> Work<'a> {
        Work::All {
            nodes: DepthTreeIterator::at(
                self.db,
                &side.tree,
                side.path.clone(),
                side.metadata_id,
                self.strategy(),
            ),
            change,
        }
    }

    fn expand(&mut self, left: Side, right: Side, depth: usize) -> DiffResult<()> {
        if left.tree.id() == right.tree.id() {
            return Ok(());
        }
        trace!(
            path = %right.path,
            depth,
            old = %left.tree.id().short_hex(),
            new = %right.tree.id().short_hex(),
            "comparing tree level"
        );
        let mut out = Vec::new();
        if left.tree.is_empty() {
            out.push(self.whole_side(&right, ChangeType::Added));
        } else if right.tree.is_empty() {
            out.push(self.whole_side(&left, ChangeType::Removed));
        } else if !left.tree.has_buckets() && !right.tree.has_buckets() {
            self.compare_children(&left, &right, &mut out)?;
        } else {
            for (l, r) in differing_slots(&left.tree, &right.tree, depth) {
                out.push(Work::Compare {
                    left: left.with_tree(load_slot(self.db, l)?),
                    right: right.with_tree(load_slot(self.db, r)?),
                    depth: depth + 1,
                });
            }
        }
        self.pending.extend(out.into_iter().rev());
        Ok(())
    }

    fn compare_children(
        &self,
        left: &Side,
        right: &Side,
        out: &mut Vec<Work<'a>>,
    ) -> DiffResult<()> {
        let l = left.tree.children();
        let r = right.tree.children();
        let (mut i, mut j) = (0, 0);
        while i < l.len() || j < r.len() {
            let order = match (l.get(i), r.get(j)) {
                (Some(a), Some(b)) => storage_order::compare_nodes(a, b),
                (Some(_), None) => Ordering::Less,
                _ => Ordering::Greater,
            };
            match order {
                Ordering::Less => {
                    self.one_sided(left.node_ref(&l[i]), ChangeType::Removed, out)?;
                    i += 1;
                }
                Ordering::Greater => {
                    self.one_sided(right.node_ref(&r[j]), ChangeType::Added, out)?;
                    j += 1;
                }
                Ordering::Equal => {
                    if l[i] != r[j] {
                        self.both_sides(left.node_ref(&l[i]), right.node_ref(&r[j]), out)?;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        Ok(())
    }

    fn one_sided(&self, node: NodeRef, change: ChangeType, out: &mut Vec<Work<'a>>) -> DiffResult<()> {
        if !node.is_tree() {
            out.push(Work::Emit(entry(node, change)));
            return Ok(());
        }
        let side = Side {
            tree: self.db.get_tree(&node.object_id())?,
            path: node.path(),
            metadata_id: node.metadata_id(),
        };
        if self.report_trees {
            out.push(Work::Emit(entry(node, change)));
        }
        out.push(self.whole_side(&side, change));
        Ok(())
    }

    fn both_sides(&self, old: NodeRef, new: NodeRef, out: &mut Vec<Work<'a>>) -> DiffResult<()> {
        if old.node_type() != new.node_type() {
            self.one_sided(old, ChangeType::Removed, out)?;
            return self.one_sided(new, ChangeType::Added, out);
        }
        if !old.is_tree() {
            out.push(Work::Emit(DiffEntry::modified(old, new)?));
            return Ok(());
        }
        let compare = Work::Compare {
            left: Side {
                tree: self.db.get_tree(&old.object_id())?,
                path: old.path(),
                metadata_id: old.metadata_id(),
            },
            right: Side {
                tree: self.db.get_tree(&new.object_id())?,
                path: new.path(),
                metadata_id: new.metadata_id(),
            },
            depth: 0,
        };
        if self.report_trees {
            out.push(Work::Emit(DiffEntry::modified(old, new)?));
        }
        out.push(compare);
        Ok(())
    }
}

fn entry(node: NodeRef, change: ChangeType) -> DiffEntry {
    match change {
        ChangeType::Added => DiffEntry::added(node),
        _ => DiffEntry::removed(node),
    }
}

impl Iterator for TreeDiffEntryIterator<'_> {
    type Item = DiffResult<DiffEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let work = self.pending.pop()?;
            if !matches!(work, Work::Emit(_)) && self.is_canceled() {
                trace!(pending = self.pending.len(), "diff canceled");
                self.pending.clear();
                return Some(Err(DiffError::Canceled));
            }
            match work {
                Work::Emit(e) => return Some(Ok(e)),
                Work::Compare { left, right, depth } => {
                    if let Err(e) = self.expand(left, right, depth) {
                        return Some(Err(e));
                    }
                }
                Work::All { mut nodes, change } => match nodes.next() {
                    None => continue,
                    Some(next) => {
                        self.pending.push(Work::All { nodes, change });
                        return Some(next.map(|n| entry(n, change)).map_err(Into::into));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_store::{InMemoryObjectDatabase, RevObject};
    use gv_tree::{RevTreeBuilder, TreeEditor};
    use gv_types::DefaultProgressListener;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest, ProptestConfig};
    use proptest::strategy::Strategy as _;
    use std::collections::BTreeMap;

    fn fid(s: &str) -> ObjectId {
        ObjectId::for_string(s)
    }

    fn layer_tree(db: &InMemoryObjectDatabase, features: &BTreeMap<String, String>) -> RevTree {
        let mut editor = TreeEditor::new(db, RevTree::empty().clone());
        for (name, version) in features {
            editor
                .put_feature(&format!("layer/{name}"), fid(version), ObjectId::NULL, None)
                .unwrap();
        }
        editor.write().unwrap()
    }

    fn flat_tree(db: &InMemoryObjectDatabase, features: &BTreeMap<String, String>) -> RevTree {
        let mut b = RevTreeBuilder::new(db);
        for (name, version) in features {
            b.put(Node::feature(name.as_str(), fid(version), ObjectId::NULL)).unwrap();
        }
        let tree = b.build().unwrap();
        db.put(&RevObject::Tree(tree.clone())).unwrap();
        tree
    }

    fn diff(db: &InMemoryObjectDatabase, a: &RevTree, b: &RevTree, trees: bool) -> Vec<DiffEntry> {
        TreeDiffEntryIterator::new(db, a, b, trees)
            .map(|e| e.unwrap())
            .collect()
    }

    fn summary(entries: &[DiffEntry]) -> BTreeSet<(String, ChangeType, ObjectId, ObjectId)> {
        entries
            .iter()
            .map(|e| (e.path(), e.change_type(), e.old_object_id(), e.new_object_id()))
            .collect()
    }

    fn named(range: std::ops::Range<u32>, version: &str) -> BTreeMap<String, String> {
        range.map(|i| (format!("f{i}"), format!("{version}{i}"))).collect()
    }

    #[test]
    fn removing_one_feature_yields_one_entry_each_way() {
        let db = InMemoryObjectDatabase::new();
        let a = layer_tree(&db, &named(1..2, "v"));
        let b = RevTree::empty().clone();
        let removed = diff(&db, &a, &b, false);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].change_type(), ChangeType::Removed);
        assert_eq!(removed[0].path(), "layer/f1");

        let added = diff(&db, &b, &a, false);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].change_type(), ChangeType::Added);
        assert_eq!(added[0].path(), "layer/f1");
    }

    #[test]
    fn deleting_from_a_layer_reports_the_feature() {
        let db = InMemoryObjectDatabase::new();
        let mut with = named(1..3, "v");
        let a = layer_tree(&db, &with);
        with.remove("f1");
        let b = layer_tree(&db, &with);
        let entries = diff(&db, &a, &b, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "layer/f1");
        assert_eq!(entries[0].change_type(), ChangeType::Removed);

        let with_trees = diff(&db, &a, &b, true);
        assert_eq!(with_trees.len(), 2);
        assert_eq!(with_trees[0].path(), "layer");
        assert_eq!(with_trees[0].change_type(), ChangeType::Modified);
    }

    #[test]
    fn identical_trees_have_no_diff() {
        let db = InMemoryObjectDatabase::new();
        let t = flat_tree(&db, &named(0..700, "v"));
        assert!(diff(&db, &t, &t, true).is_empty());
    }

    #[test]
    fn modifications_in_bucketed_trees() {
        let db = InMemoryObjectDatabase::new();
        let mut contents = named(0..900, "v");
        let a = flat_tree(&db, &contents);
        contents.insert("f10".into(), "changed".into());
        contents.remove("f20");
        contents.insert("extra".into(), "x".into());
        let b = flat_tree(&db, &contents);

        let got = summary(&diff(&db, &a, &b, false));
        let expected: BTreeSet<_> = [
            ("f10".to_string(), ChangeType::Modified, fid("v10"), fid("changed")),
            ("f20".to_string(), ChangeType::Removed, fid("v20"), ObjectId::NULL),
            ("extra".to_string(), ChangeType::Added, ObjectId::NULL, fid("x")),
        ]
        .into_iter()
        .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn whole_bucketed_sides_are_enumerated() {
        let db = InMemoryObjectDatabase::new();
        let empty = RevTree::empty().clone();
        let t = flat_tree(&db, &named(0..600, "v"));
        assert!(t.has_buckets());

        let added = diff(&db, &empty, &t, false);
        assert_eq!(added.len(), 600);
        assert!(added.iter().all(|e| e.change_type() == ChangeType::Added));
        let removed = diff(&db, &t, &empty, false);
        assert_eq!(removed.len(), 600);
        assert!(removed.iter().all(|e| e.change_type() == ChangeType::Removed));
    }

    #[test]
    fn cancellation_stops_a_bucketed_walk() {
        let db = InMemoryObjectDatabase::new();
        let a = flat_tree(&db, &named(0..900, "v"));
        let b = flat_tree(&db, &named(0..900, "w"));
        let listener = DefaultProgressListener::new();
        let mut walk = TreeDiffEntryIterator::new(&db, &a, &b, false).with_listener(&listener);

        assert!(walk.next().unwrap().is_ok());
        listener.cancel();
        let mut emitted = 1;
        let canceled = loop {
            match walk.next() {
                Some(Ok(_)) => emitted += 1,
                Some(Err(e)) => break e,
                None => panic!("walk finished after cancel"),
            }
        };
        assert!(matches!(canceled, DiffError::Canceled));
        assert!(emitted < 900);
        assert!(walk.next().is_none());
    }

    #[test]
    fn canceled_listener_yields_no_entries() {
        let db = InMemoryObjectDatabase::new();
        let a = flat_tree(&db, &named(0..10, "v"));
        let b = flat_tree(&db, &named(0..10, "w"));
        let listener = DefaultProgressListener::new();
        listener.cancel();
        let results: Vec<_> = TreeDiffEntryIterator::new(&db, &a, &b, false)
            .with_listener(&listener)
            .collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DiffError::Canceled)));
    }

    #[test]
    fn leaf_against_bucketed_matches_full_enumeration() {
        let db = InMemoryObjectDatabase::new();
        let small = named(0..300, "v");
        let mut large = named(0..800, "v");
        large.insert("f5".into(), "changed".into());
        let a = flat_tree(&db, &small);
        let b = flat_tree(&db, &large);
        assert!(!a.has_buckets());
        assert!(b.has_buckets());

        let entries = diff(&db, &a, &b, false);
        assert_eq!(entries.len(), 501);
        let modified: Vec<_> = entries
            .iter()
            .filter(|e| e.change_type() == ChangeType::Modified)
            .collect();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].path(), "f5");

        let reverse = diff(&db, &b, &a, false);
        let flipped: Vec<DiffEntry> = reverse.iter().map(|e| e.reversed()).collect();
        assert_eq!(summary(&flipped), summary(&entries));
    }

    #[test]
    fn added_subtrees_are_reported_with_their_contents() {
        let db = InMemoryObjectDatabase::new();
        let a = RevTree::empty().clone();
        let b = layer_tree(&db, &named(0..3, "v"));
        let entries = diff(&db, &a, &b, true);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].path(), "layer");
        assert!(entries[0].is_tree());
        assert!(entries[1..].iter().all(|e| e.is_feature()));
    }

    #[test]
    fn feature_replaced_by_tree_is_a_removal_and_an_addition() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_feature("thing", fid("f"), ObjectId::NULL, None).unwrap();
        let a = editor.write().unwrap();
        let mut editor = TreeEditor::new(&db, a.clone());
        editor.remove("thing").unwrap();
        editor.put_feature("thing/inner", fid("g"), ObjectId::NULL, None).unwrap();
        let b = editor.write().unwrap();

        let got = summary(&diff(&db, &a, &b, false));
        let expected: BTreeSet<_> = [
            ("thing".to_string(), ChangeType::Removed, fid("f"), ObjectId::NULL),
            ("thing/inner".to_string(), ChangeType::Added, ObjectId::NULL, fid("g")),
        ]
        .into_iter()
        .collect();
        assert_eq!(got, expected);
    }

    fn contents() -> impl proptest::strategy::Strategy<Value = BTreeMap<String, String>> {
        proptest::collection::btree_map(0u32..1200, 0u8..3, 0..700).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (format!("f{k}"), format!("v{v}")))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn diff_is_symmetric(a in contents(), b in contents()) {
            let db = InMemoryObjectDatabase::new();
            let ta = flat_tree(&db, &a);
            let tb = flat_tree(&db, &b);
            let forward = diff(&db, &ta, &tb, false);
            let backward: Vec<DiffEntry> =
                diff(&db, &tb, &ta, false).iter().map(|e| e.reversed()).collect();
            prop_assert_eq!(summary(&forward), summary(&backward));
            prop_assert!(diff(&db, &ta, &ta, false).is_empty());
        }

        #[test]
        fn applying_the_diff_reconstructs_the_target(a in contents(), b in contents()) {
            let db = InMemoryObjectDatabase::new();
            let ta = flat_tree(&db, &a);
            let tb = flat_tree(&db, &b);
            let mut builder = RevTreeBuilder::from_tree(&db, &ta);
            for e in diff(&db, &ta, &tb, false) {
                match e.new_node() {
                    Some(n) => builder.put(n.node().clone()).unwrap(),
                    None => builder.remove(&e.path()).unwrap(),
                }
            }
            prop_assert_eq!(builder.build().unwrap().id(), tb.id());
        }
    }
}
