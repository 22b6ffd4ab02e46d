//! Applying a [`Patch`] to a tree.
//!
//! Application runs in two phases. The check phase sorts every change of the
//! patch into the part that applies cleanly to the target tree and the part
//! that does not:
//!
//! - an added feature applies if nothing exists at its path;
//! - a removed feature applies if the same feature, with the same type, is
//!   at its path;
//! - a modified feature applies if the feature at its path has the diff's
//!   old type and holds the old value of every changed attribute;
//! - a tree change applies if the tree's current state matches the old
//!   state recorded in the patch.
//!
//! The write phase then applies the clean part with a single tree edit. By
//! default any rejected change aborts the whole operation; partial
//! application writes what it can and hands back the rest.

use std::borrow::Cow;

use gv_diff::DiffError;
use gv_store::{ObjectDatabase, RevObject, RevTree};
use gv_tree::{DepthSearch, TreeEditor};
use gv_types::{path, ObjectId};
use tracing::debug;

use crate::create::own_metadata;
use crate::error::{PatchError, PatchResult};
use crate::patch::Patch;

/// Result of the check phase.
#[derive(Clone, Debug, Default)]
pub struct PatchCheck {
    pub to_apply: Patch,
    pub rejected: Patch,
}

/// Result of a successful application.
#[derive(Clone, Debug)]
pub struct AppliedPatch {
    /// The new root tree, already stored.
    pub tree: RevTree,
    /// Changes left out by a partial application.
    pub rejected: Patch,
}

/// Configurable application of a patch.
pub struct ApplyPatch<'a> {
    db: &'a dyn ObjectDatabase,
    patch: &'a Patch,
    reverse: bool,
    partial: bool,
}

impl<'a> ApplyPatch<'a> {
    pub fn new(db: &'a dyn ObjectDatabase, patch: &'a Patch) -> Self {
        Self {
            db,
            patch,
            reverse: false,
            partial: false,
        }
    }

    /// Apply the reversed patch, undoing its changes.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Write the applicable changes even when others are rejected.
    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    fn effective(&self) -> Cow<'a, Patch> {
        if self.reverse {
            Cow::Owned(self.patch.reversed())
        } else {
            Cow::Borrowed(self.patch)
        }
    }

    /// Sort the changes into those that apply to `root` and those that do
    /// not. Nothing is written.
    pub fn check(&self, root: &RevTree) -> PatchResult<PatchCheck> {
        let patch = self.effective();
        let search = DepthSearch::new(self.db);
        let mut check = PatchCheck::default();
        for ft in patch.feature_types() {
            check.to_apply.add_feature_type(ft.clone());
            check.rejected.add_feature_type(ft.clone());
        }

        for diff in patch.modified_features() {
            let applies = match search.find(root, diff.path())? {
                Some(node) if node.is_feature() && node.metadata_id() == diff.old_type().id() => {
                    diff.can_be_applied_on(&self.db.get_feature(&node.object_id())?)
                }
                _ => false,
            };
            let target = if applies { &mut check.to_apply } else { &mut check.rejected };
            target.add_modified_feature(diff.clone());
        }

        for feature in patch.added_features() {
            let applies = search.find(root, &feature.path)?.is_none();
            let target = if applies { &mut check.to_apply } else { &mut check.rejected };
            target.add_added_feature(
                feature.path.clone(),
                feature.feature.clone(),
                feature.feature_type.clone(),
            );
        }

        for feature in patch.removed_features() {
            let applies = search.find(root, &feature.path)?.is_some_and(|node| {
                node.is_feature()
                    && node.object_id() == feature.feature.id()
                    && node.metadata_id() == feature.feature_type.id()
            });
            let target = if applies { &mut check.to_apply } else { &mut check.rejected };
            target.add_removed_feature(
                feature.path.clone(),
                feature.feature.clone(),
                feature.feature_type.clone(),
            );
        }

        for tree in patch.altered_trees() {
            let applies = match search.find(root, &tree.path)? {
                None => tree.old_metadata.is_none(),
                Some(node) => node.is_tree() && Some(own_metadata(&node)) == tree.old_metadata,
            };
            let target = if applies { &mut check.to_apply } else { &mut check.rejected };
            target.add_altered_tree(tree.clone());
        }

        debug!(
            applicable = check.to_apply.count(),
            rejected = check.rejected.count(),
            "checked patch"
        );
        Ok(check)
    }

    /// Apply the patch to `root` and return the new root tree.
    ///
    /// Unless partial application is enabled, fails with
    /// [`PatchError::CannotApply`] carrying the rejected changes when any
    /// change does not apply, and writes nothing.
    pub fn apply(&self, root: &RevTree) -> PatchResult<AppliedPatch> {
        let PatchCheck { to_apply, rejected } = self.check(root)?;
        if !self.partial && !rejected.is_empty() {
            return Err(PatchError::CannotApply(rejected));
        }
        let tree = self.write(root, &to_apply)?;
        debug!(
            tree = %tree.id().short_hex(),
            applied = to_apply.count(),
            rejected = rejected.count(),
            "applied patch"
        );
        Ok(AppliedPatch { tree, rejected })
    }

    fn write(&self, root: &RevTree, patch: &Patch) -> PatchResult<RevTree> {
        for ft in patch.feature_types() {
            self.db.put(&RevObject::FeatureType(ft.clone()))?;
        }
        let search = DepthSearch::new(self.db);
        let mut editor = TreeEditor::new(self.db, root.clone());

        for tree in patch.altered_trees() {
            match tree.new_metadata {
                None => editor.remove(&tree.path)?,
                Some(metadata_id) => editor.put_tree(&tree.path, metadata_id)?,
            }
        }
        for feature in patch.removed_features() {
            editor.remove(&feature.path)?;
        }
        for feature in patch.added_features() {
            self.db.put(&RevObject::Feature(feature.feature.clone()))?;
            let metadata_id =
                self.node_metadata(root, patch, &feature.path, feature.feature_type.id())?;
            editor.put_feature(
                &feature.path,
                feature.feature.id(),
                metadata_id,
                feature.feature.bounds(),
            )?;
        }
        for diff in patch.modified_features() {
            let node = search.find(root, diff.path())?.ok_or_else(|| {
                DiffError::CannotApply(format!("no feature at '{}'", diff.path()))
            })?;
            let feature = diff.apply_on(&self.db.get_feature(&node.object_id())?)?;
            self.db.put(&RevObject::Feature(feature.clone()))?;
            let metadata_id = self.node_metadata(root, patch, diff.path(), diff.new_type().id())?;
            editor.put_feature(diff.path(), feature.id(), metadata_id, feature.bounds())?;
        }
        Ok(editor.write()?)
    }

    /// Metadata to store on a feature node: NULL when the feature type is
    /// the one the node inherits from its tree.
    fn node_metadata(
        &self,
        root: &RevTree,
        patch: &Patch,
        feature_path: &str,
        type_id: ObjectId,
    ) -> PatchResult<ObjectId> {
        let inherited = self.inherited_metadata(root, patch, path::parent_path(feature_path))?;
        Ok(if inherited == type_id {
            ObjectId::NULL
        } else {
            type_id
        })
    }

    fn inherited_metadata(
        &self,
        root: &RevTree,
        patch: &Patch,
        tree_path: &str,
    ) -> PatchResult<ObjectId> {
        if tree_path.is_empty() {
            return Ok(ObjectId::NULL);
        }
        let altered = patch.altered_trees().iter().find(|t| t.path == tree_path);
        let own = match altered {
            Some(tree) => tree.new_metadata.unwrap_or(ObjectId::NULL),
            None => DepthSearch::new(self.db)
                .find(root, tree_path)?
                .map_or(ObjectId::NULL, |node| own_metadata(&node)),
        };
        if own.is_null() {
            self.inherited_metadata(root, patch, path::parent_path(tree_path))
        } else {
            Ok(own)
        }
    }
}

/// Apply `patch` to `root`, failing if any change does not apply.
pub fn apply_patch(db: &dyn ObjectDatabase, root: &RevTree, patch: &Patch) -> PatchResult<RevTree> {
    Ok(ApplyPatch::new(db, patch).apply(root)?.tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::create_patch;
    use crate::serializer::{read_patch, write_patch};
    use gv_diff::DiffTree;
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
                ],
            );
            db.put(&RevObject::FeatureType(roads.clone())).unwrap();
            Self { db, roads }
        }

        fn road(&self, name: &str, end: f64) -> RevFeature {
            RevFeature::of([
                Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (end, 1.0)])),
                Value::from(name),
            ])
        }

        fn build(&self, features: &[(&str, RevFeature)]) -> RevTree {
            let mut editor = TreeEditor::new(&self.db, RevTree::empty().clone());
            editor.put_tree("roads", self.roads.id()).unwrap();
            for (name, feature) in features {
                self.db.put(&RevObject::Feature(feature.clone())).unwrap();
                editor
                    .put_feature(
                        &format!("roads/{name}"),
                        feature.id(),
                        ObjectId::NULL,
                        feature.bounds(),
                    )
                    .unwrap();
            }
            editor.write().unwrap()
        }

        fn patch(&self, old: &RevTree, new: &RevTree) -> Patch {
            let entries = DiffTree::new(&self.db)
                .old_tree(old.id())
                .new_tree(new.id())
                .report_trees(true)
                .call()
                .unwrap();
            create_patch(&self.db, entries).unwrap()
        }
    }

    #[test]
    fn applying_a_diff_reproduces_the_new_tree() {
        let fx = Fixture::new();
        let old = fx.build(&[("r1", fx.road("a", 1.0)), ("r2", fx.road("b", 1.0))]);
        let new = fx.build(&[("r1", fx.road("a", 2.0)), ("r3", fx.road("c", 1.0))]);
        let patch = fx.patch(&old, &new);
        assert_eq!(patch.added_features().len(), 1);
        assert_eq!(patch.removed_features().len(), 1);
        assert_eq!(patch.modified_features().len(), 1);
        assert!(patch.altered_trees().is_empty());

        assert_eq!(apply_patch(&fx.db, &old, &patch).unwrap(), new);
    }

    #[test]
    fn reverse_application_restores_the_old_tree() {
        let fx = Fixture::new();
        let old = fx.build(&[("r1", fx.road("a", 1.0)), ("r2", fx.road("b", 1.0))]);
        let new = fx.build(&[("r1", fx.road("z", 1.0))]);
        let patch = fx.patch(&old, &new);
        let restored = ApplyPatch::new(&fx.db, &patch)
            .reverse(true)
            .apply(&new)
            .unwrap();
        assert_eq!(restored.tree, old);
        assert!(restored.rejected.is_empty());
    }

    #[test]
    fn survives_the_text_format() {
        let fx = Fixture::new();
        let old = fx.build(&[("r1", fx.road("a", 1.0))]);
        let new = fx.build(&[("r1", fx.road("b", 4.0)), ("r2", fx.road("c", 1.0))]);
        let text = write_patch(&fx.patch(&old, &new));

        let elsewhere = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&elsewhere, RevTree::empty().clone());
        editor.put_tree("roads", fx.roads.id()).unwrap();
        let feature = fx.road("a", 1.0);
        elsewhere.put(&RevObject::Feature(feature.clone())).unwrap();
        editor
            .put_feature("roads/r1", feature.id(), ObjectId::NULL, feature.bounds())
            .unwrap();
        let base = editor.write().unwrap();

        let patch = read_patch(&text).unwrap();
        assert_eq!(apply_patch(&elsewhere, &base, &patch).unwrap(), new);
        assert!(elsewhere.exists(&fx.roads.id()).unwrap());
    }

    #[test]
    fn conflicting_changes_are_rejected() {
        let fx = Fixture::new();
        let old = fx.build(&[("r1", fx.road("a", 1.0)), ("r2", fx.road("b", 1.0))]);
        let new = fx.build(&[("r1", fx.road("x", 1.0)), ("r2", fx.road("y", 1.0))]);
        let patch = fx.patch(&old, &new);

        let target = fx.build(&[("r1", fx.road("a", 1.0)), ("r2", fx.road("other", 1.0))]);
        match apply_patch(&fx.db, &target, &patch) {
            Err(PatchError::CannotApply(rejected)) => {
                assert_eq!(rejected.count(), 1);
                assert_eq!(rejected.modified_features()[0].path(), "roads/r2");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let applied = ApplyPatch::new(&fx.db, &patch)
            .partial(true)
            .apply(&target)
            .unwrap();
        assert_eq!(applied.rejected.count(), 1);
        let expected = fx.build(&[("r1", fx.road("x", 1.0)), ("r2", fx.road("other", 1.0))]);
        assert_eq!(applied.tree, expected);
    }

    #[test]
    fn added_features_must_not_exist_yet() {
        let fx = Fixture::new();
        let old = fx.build(&[]);
        let new = fx.build(&[("r1", fx.road("a", 1.0))]);
        let patch = fx.patch(&old, &new);
        let check = ApplyPatch::new(&fx.db, &patch).check(&new).unwrap();
        assert!(check.to_apply.is_empty());
        assert_eq!(check.rejected.added_features().len(), 1);
    }

    #[test]
    fn tree_changes_are_carried() {
        let fx = Fixture::new();
        let old = fx.build(&[("r1", fx.road("a", 1.0))]);
        let new = RevTree::empty().clone();
        let patch = fx.patch(&old, &new);
        assert_eq!(patch.altered_trees().len(), 1);
        assert_eq!(patch.altered_trees()[0].old_metadata, Some(fx.roads.id()));
        assert_eq!(patch.altered_trees()[0].new_metadata, None);

        assert_eq!(apply_patch(&fx.db, &old, &patch).unwrap().id(), RevTree::empty_id());
        let back = ApplyPatch::new(&fx.db, &patch).reverse(true).apply(&new).unwrap();
        assert_eq!(back.tree, old);
    }

    #[test]
    fn features_without_a_type_cannot_be_patched() {
        let fx = Fixture::new();
        let mut editor = TreeEditor::new(&fx.db, RevTree::empty().clone());
        let feature = fx.road("a", 1.0);
        fx.db.put(&RevObject::Feature(feature.clone())).unwrap();
        editor.put_feature("loose", feature.id(), ObjectId::NULL, None).unwrap();
        let new = editor.write().unwrap();
        let entries = DiffTree::new(&fx.db)
            .old_tree(RevTree::empty_id())
            .new_tree(new.id())
            .call()
            .unwrap();
        assert!(matches!(
            create_patch(&fx.db, entries),
            Err(PatchError::MissingFeatureType(p)) if p == "loose"
        ));
    }
}
