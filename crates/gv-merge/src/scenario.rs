//! Three-way comparison and merge of two trees against their ancestor.
//!
//! "Ours" is the tree being merged into and "theirs" the tree whose changes
//! are carried over. Both are diffed against the ancestor with tree
//! reporting, and every change of theirs is classified against ours at the
//! same path:
//!
//! - change types differ: conflict;
//! - both added or both modified a tree: conflict only if the metadata ids
//!   differ;
//! - both added a feature: conflict unless the nodes are identical;
//! - both modified a feature: conflict if the attribute diffs conflict,
//!   otherwise carried over when the diffs differ;
//! - both removed: nothing to do;
//! - theirs removed a tree that ours changed something below: conflict;
//! - anything else: carried over.

use std::collections::BTreeMap;

use gv_diff::{ChangeType, DiffEntry, TreeDiffEntryIterator};
use gv_store::{Node, NodeRef, ObjectDatabase, RevObject, RevTree};
use gv_tree::{DepthSearch, TreeEditor};
use gv_types::{path, ObjectId};
use tracing::debug;

use crate::conflict::{Conflict, ConflictsReport};
use crate::error::{MergeError, MergeResult};
use crate::features::{feature_diff, merge_features, Version};

/// Result of a successful merge.
#[derive(Clone, Debug)]
pub enum MergeOutcome {
    /// Theirs holds nothing ours lacks; ours is the result.
    UpToDate(RevTree),
    /// Ours is the ancestor; theirs is the result.
    FastForward(RevTree),
    /// A new tree combining both sides.
    Merged {
        tree: RevTree,
        report: ConflictsReport,
    },
}

impl MergeOutcome {
    pub fn tree(&self) -> &RevTree {
        match self {
            MergeOutcome::UpToDate(tree) | MergeOutcome::FastForward(tree) => tree,
            MergeOutcome::Merged { tree, .. } => tree,
        }
    }
}

pub struct MergeScenario<'a> {
    db: &'a dyn ObjectDatabase,
    ancestor: RevTree,
    ours: RevTree,
    theirs: RevTree,
}

impl<'a> MergeScenario<'a> {
    pub fn new(db: &'a dyn ObjectDatabase, ancestor: RevTree, ours: RevTree, theirs: RevTree) -> Self {
        Self {
            db,
            ancestor,
            ours,
            theirs,
        }
    }

    /// Every conflict and every change of theirs that merges cleanly.
    pub fn report(&self) -> MergeResult<ConflictsReport> {
        Ok(self.scan(false)?.0)
    }

    /// Returns `true` at the first conflict found.
    pub fn has_conflicts(&self) -> MergeResult<bool> {
        Ok(self.scan(true)?.0.has_conflicts())
    }

    fn diffs(&self, tree: &RevTree) -> MergeResult<BTreeMap<String, DiffEntry>> {
        let mut out = BTreeMap::new();
        for entry in TreeDiffEntryIterator::new(self.db, &self.ancestor, tree, true) {
            let entry = entry?;
            out.insert(entry.path(), entry);
        }
        Ok(out)
    }

    fn version(&self, node: Option<&NodeRef>) -> MergeResult<Option<Version>> {
        node.map(|n| Version::load(self.db, n)).transpose()
    }

    fn scan(&self, stop_at_first: bool) -> MergeResult<(ConflictsReport, BTreeMap<String, DiffEntry>)> {
        let ours = self.diffs(&self.ours)?;
        let search = DepthSearch::new(self.db);
        let mut report = ConflictsReport::default();

        for entry in TreeDiffEntryIterator::new(self.db, &self.ancestor, &self.theirs, true) {
            if stop_at_first && report.has_conflicts() {
                break;
            }
            let theirs = entry?;
            let path = theirs.path();
            let ancestor = search.find(&self.ancestor, &path)?;
            let ancestor_id = ancestor.as_ref().map_or(ObjectId::NULL, NodeRef::object_id);

            let Some(mine) = ours.get(&path) else {
                if theirs.change_type() == ChangeType::Removed && theirs.is_tree() {
                    let changed_below = ours.iter().any(|(p, e)| {
                        path::is_child(&path, p) && e.change_type() != ChangeType::Removed
                    });
                    if changed_below {
                        let ours_id = search
                            .find(&self.ours, &path)?
                            .map_or(ObjectId::NULL, |n| n.object_id());
                        report
                            .conflicts
                            .push(Conflict::new(path, ancestor_id, ours_id, ObjectId::NULL));
                        continue;
                    }
                }
                report.unconflicted.push(theirs);
                continue;
            };

            let ours_id = mine.new_object_id();
            let theirs_id = theirs.new_object_id();
            let conflict = || Conflict::new(path.clone(), ancestor_id, ours_id, theirs_id);
            if mine.change_type() != theirs.change_type() {
                report.conflicts.push(conflict());
                continue;
            }
            let (Some(mine_new), Some(theirs_new)) = (mine.new_node(), theirs.new_node()) else {
                // removed on both sides
                continue;
            };
            if mine_new.node() == theirs_new.node() {
                continue;
            }
            if theirs.is_tree() {
                if mine_new.metadata_id() != theirs_new.metadata_id() {
                    report.conflicts.push(Conflict::new(
                        path.clone(),
                        ancestor.as_ref().map_or(ObjectId::NULL, NodeRef::metadata_id),
                        mine_new.metadata_id(),
                        theirs_new.metadata_id(),
                    ));
                }
                continue;
            }
            if theirs.change_type() == ChangeType::Added {
                report.conflicts.push(conflict());
                continue;
            }

            let base = self.version(theirs.old())?;
            let (Some(base), Some(ours_version), Some(theirs_version)) =
                (base, self.version(Some(mine_new))?, self.version(Some(theirs_new))?)
            else {
                report.conflicts.push(conflict());
                continue;
            };
            let ours_diff = feature_diff(&path, &base, &ours_version);
            let theirs_diff = feature_diff(&path, &base, &theirs_version);
            if ours_version.feature_type.id() != theirs_version.feature_type.id()
                || theirs_diff.conflicts(&ours_diff)
            {
                report.conflicts.push(conflict());
            } else if theirs_diff != ours_diff {
                report.unconflicted.push(theirs);
            }
        }

        debug!(
            ancestor = %self.ancestor.id().short_hex(),
            ours = %self.ours.id().short_hex(),
            theirs = %self.theirs.id().short_hex(),
            conflicts = report.conflicts.len(),
            unconflicted = report.unconflicted.len(),
            "merge scenario"
        );
        Ok((report, ours))
    }

    /// Merge theirs into ours.
    ///
    /// Fails with [`MergeError::Conflicts`] carrying the full report when any
    /// path conflicts. The merged root tree and its subtrees are stored.
    pub fn merge(&self) -> MergeResult<MergeOutcome> {
        if self.theirs.id() == self.ours.id() || self.theirs.id() == self.ancestor.id() {
            return Ok(MergeOutcome::UpToDate(self.ours.clone()));
        }
        if self.ancestor.id() == self.ours.id() {
            return Ok(MergeOutcome::FastForward(self.theirs.clone()));
        }
        let (mut report, ours) = self.scan(false)?;
        if report.has_conflicts() {
            return Err(MergeError::Conflicts(report));
        }

        let mut editor = TreeEditor::new(self.db, self.ours.clone());
        let mut removed_trees: Vec<String> = Vec::new();
        for entry in &report.unconflicted {
            let path = entry.path();
            if removed_trees.iter().any(|r| path::is_child(r, &path)) {
                continue;
            }
            let Some(theirs) = entry.new_node() else {
                editor.remove(&path)?;
                if entry.is_tree() {
                    removed_trees.push(path);
                }
                continue;
            };
            if theirs.is_tree() {
                editor.put_tree(&path, theirs.node().metadata_id().unwrap_or(ObjectId::NULL))?;
                continue;
            }
            let both_modified = ours
                .get(&path)
                .filter(|e| e.change_type() == ChangeType::Modified && e.is_feature());
            let Some(mine) = both_modified else {
                editor.put_node(theirs.parent_path(), theirs.node().clone())?;
                continue;
            };
            let (Some(base), Some(mine_new)) = (entry.old(), mine.new_node()) else {
                continue;
            };
            let merged = merge_features(
                &path,
                &Version::load(self.db, base)?,
                &Version::load(self.db, mine_new)?,
                &Version::load(self.db, theirs)?,
            )?;
            let Some(merged) = merged else {
                report.conflicts.push(Conflict::new(
                    path.clone(),
                    base.object_id(),
                    mine_new.object_id(),
                    theirs.object_id(),
                ));
                continue;
            };
            self.db.put(&RevObject::Feature(merged.clone()))?;
            let node = Node::feature(
                mine_new.name(),
                merged.id(),
                mine_new.node().metadata_id().unwrap_or(ObjectId::NULL),
            )
            .with_bounds(merged.bounds());
            editor.put_node(mine_new.parent_path(), node)?;
        }
        if report.has_conflicts() {
            return Err(MergeError::Conflicts(report));
        }

        let tree = editor.write()?;
        debug!(
            merged = %tree.id().short_hex(),
            changes = report.unconflicted.len(),
            "merged trees"
        );
        Ok(MergeOutcome::Merged { tree, report })
    }
}

/// Returns `true` if merging `theirs` into `ours` would conflict.
pub fn check_conflicts(
    db: &dyn ObjectDatabase,
    ancestor: &RevTree,
    ours: &RevTree,
    theirs: &RevTree,
) -> MergeResult<bool> {
    MergeScenario::new(db, ancestor.clone(), ours.clone(), theirs.clone()).has_conflicts()
}

/// Merge `theirs` into `ours` given their common `ancestor`.
pub fn merge_trees(
    db: &dyn ObjectDatabase,
    ancestor: &RevTree,
    ours: &RevTree,
    theirs: &RevTree,
) -> MergeResult<MergeOutcome> {
    MergeScenario::new(db, ancestor.clone(), ours.clone(), theirs.clone()).merge()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_store::{InMemoryObjectDatabase, PropertyDescriptor, RevFeature, RevFeatureType};
    use gv_types::{FieldType, Geometry, Value};

    struct Fixture {
        db: InMemoryObjectDatabase,
        roads: RevFeatureType,
    }

    impl Fixture {
        fn new() -> Self {
            let db = InMemoryObjectDatabase::new();
            let roads = RevFeatureType::new(
                "roads",
                vec![
                    PropertyDescriptor::new("geom", FieldType::Geometry),
                    PropertyDescriptor::new("name", FieldType::String),
                    PropertyDescriptor::new("lanes", FieldType::Integer),
                ],
            );
            db.put(&RevObject::FeatureType(roads.clone())).unwrap();
            Self { db, roads }
        }

        fn feature(&self, name: &str, lanes: i32) -> RevFeature {
            let f = RevFeature::of([
                Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (1.0, 1.0)])),
                Value::from(name),
                Value::from(lanes),
            ]);
            self.db.put(&RevObject::Feature(f.clone())).unwrap();
            f
        }

        fn edit(&self, base: &RevTree, puts: &[(&str, RevFeature)], removes: &[&str]) -> RevTree {
            let mut editor = TreeEditor::new(&self.db, base.clone());
            editor.put_tree("roads", self.roads.id()).unwrap();
            for (p, f) in puts {
                editor.put_feature(p, f.id(), ObjectId::NULL, None).unwrap();
            }
            for p in removes {
                editor.remove(p).unwrap();
            }
            editor.write().unwrap()
        }

        fn base(&self) -> RevTree {
            let empty = RevTree::empty().clone();
            self.edit(
                &empty,
                &[
                    ("roads/r1", self.feature("Main", 2)),
                    ("roads/r2", self.feature("High", 4)),
                    ("roads/r3", self.feature("Low", 1)),
                ],
                &[],
            )
        }

        fn find(&self, tree: &RevTree, p: &str) -> Option<NodeRef> {
            DepthSearch::new(&self.db).find(tree, p).unwrap()
        }
    }

    #[test]
    fn disjoint_changes_merge_cleanly() {
        let fx = Fixture::new();
        let base = fx.base();
        let ours = fx.edit(&base, &[("roads/r1", fx.feature("Main St", 2))], &[]);
        let theirs = fx.edit(&base, &[("roads/r9", fx.feature("New", 1))], &["roads/r2"]);

        let outcome = merge_trees(&fx.db, &base, &ours, &theirs).unwrap();
        let MergeOutcome::Merged { tree, report } = outcome else {
            panic!("expected a merge");
        };
        let mut carried: Vec<String> = report.unconflicted.iter().map(|e| e.path()).collect();
        carried.sort();
        assert_eq!(carried, vec!["roads/r2", "roads/r9"]);

        assert!(fx.find(&tree, "roads/r2").is_none());
        assert!(fx.find(&tree, "roads/r9").is_some());
        assert_eq!(
            fx.find(&tree, "roads/r1").unwrap().object_id(),
            fx.find(&ours, "roads/r1").unwrap().object_id()
        );
        assert!(!check_conflicts(&fx.db, &base, &ours, &theirs).unwrap());
    }

    #[test]
    fn same_attribute_changed_differently_conflicts() {
        let fx = Fixture::new();
        let base = fx.base();
        let ours = fx.edit(&base, &[("roads/r1", fx.feature("Main", 3))], &[]);
        let theirs = fx.edit(&base, &[("roads/r1", fx.feature("Main", 5))], &[]);

        let report = MergeScenario::new(&fx.db, base.clone(), ours.clone(), theirs.clone())
            .report()
            .unwrap();
        assert_eq!(report.conflicts.len(), 1);
        let c = report.conflict("roads/r1").unwrap();
        assert_eq!(c.ancestor, fx.find(&base, "roads/r1").unwrap().object_id());
        assert_eq!(c.ours, fx.find(&ours, "roads/r1").unwrap().object_id());
        assert_eq!(c.theirs, fx.find(&theirs, "roads/r1").unwrap().object_id());

        assert!(check_conflicts(&fx.db, &base, &ours, &theirs).unwrap());
        assert!(matches!(
            merge_trees(&fx.db, &base, &ours, &theirs),
            Err(MergeError::Conflicts(r)) if r.conflicts.len() == 1
        ));
    }

    #[test]
    fn different_attributes_of_one_feature_are_combined() {
        let fx = Fixture::new();
        let base = fx.base();
        let ours = fx.edit(&base, &[("roads/r1", fx.feature("Main St", 2))], &[]);
        let theirs = fx.edit(&base, &[("roads/r1", fx.feature("Main", 6))], &[]);

        let MergeOutcome::Merged { tree, .. } = merge_trees(&fx.db, &base, &ours, &theirs).unwrap()
        else {
            panic!("expected a merge");
        };
        let node = fx.find(&tree, "roads/r1").unwrap();
        let merged = fx.db.get_feature(&node.object_id()).unwrap();
        assert_eq!(merged.get(1), Some(&Value::from("Main St")));
        assert_eq!(merged.get(2), Some(&Value::from(6)));
        assert_eq!(node.metadata_id(), fx.roads.id());
    }

    #[test]
    fn identical_changes_do_not_conflict() {
        let fx = Fixture::new();
        let base = fx.base();
        let ours = fx.edit(&base, &[("roads/r4", fx.feature("Same", 1))], &["roads/r3"]);
        let theirs = fx.edit(&base, &[("roads/r4", fx.feature("Same", 1))], &["roads/r3"]);
        let report = MergeScenario::new(&fx.db, base, ours, theirs).report().unwrap();
        assert!(report.is_empty());

        let other = fx.base();
        let a = fx.edit(&other, &[("roads/r4", fx.feature("A", 1))], &[]);
        let b = fx.edit(&other, &[("roads/r4", fx.feature("B", 1))], &[]);
        assert!(check_conflicts(&fx.db, &other, &a, &b).unwrap());
    }

    #[test]
    fn removing_a_tree_changed_on_the_other_side_conflicts() {
        let fx = Fixture::new();
        let base = fx.base();
        let ours = fx.edit(&base, &[("roads/r1", fx.feature("Main St", 2))], &[]);
        let mut editor = TreeEditor::new(&fx.db, base.clone());
        editor.remove("roads").unwrap();
        let theirs = editor.write().unwrap();

        let report = MergeScenario::new(&fx.db, base, ours, theirs).report().unwrap();
        assert!(report.conflict("roads").is_some());
        assert!(report.conflict("roads/r1").is_some());
    }

    #[test]
    fn tree_metadata_changes_conflict_only_when_they_differ() {
        let fx = Fixture::new();
        let base = fx.base();
        let rivers = RevFeatureType::new("rivers", vec![PropertyDescriptor::new("name", FieldType::String)]);
        let lakes = RevFeatureType::new("lakes", vec![PropertyDescriptor::new("depth", FieldType::Double)]);

        let with_tree = |ft: &RevFeatureType| {
            let mut editor = TreeEditor::new(&fx.db, base.clone());
            editor.put_tree("water", ft.id()).unwrap();
            editor.write().unwrap()
        };
        let ours = with_tree(&rivers);
        let theirs = with_tree(&lakes);
        let report = MergeScenario::new(&fx.db, base.clone(), ours.clone(), theirs).report().unwrap();
        let c = report.conflict("water").unwrap();
        assert_eq!(c.ours, rivers.id());
        assert_eq!(c.theirs, lakes.id());
        assert_eq!(c.ancestor, ObjectId::NULL);

        let same = with_tree(&rivers);
        assert!(!check_conflicts(&fx.db, &base, &ours, &same).unwrap());
    }

    #[test]
    fn fast_forward_and_up_to_date() {
        let fx = Fixture::new();
        let base = fx.base();
        let ahead = fx.edit(&base, &[("roads/r5", fx.feature("Five", 1))], &[]);
        assert!(matches!(
            merge_trees(&fx.db, &base, &base, &ahead).unwrap(),
            MergeOutcome::FastForward(t) if t == ahead
        ));
        assert!(matches!(
            merge_trees(&fx.db, &base, &ahead, &base).unwrap(),
            MergeOutcome::UpToDate(t) if t == ahead
        ));
    }
}
