//! The patch model: features added and removed, features modified attribute
//! by attribute, and trees whose feature type changed.

use std::fmt;

use gv_diff::FeatureDiff;
use gv_store::{RevFeature, RevFeatureType};
use gv_types::ObjectId;

/// A whole feature carried by a patch, with the type it is read with.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchFeature {
    pub path: String,
    pub feature: RevFeature,
    pub feature_type: RevFeatureType,
}

/// A tree created, removed, or retyped. `None` means the tree does not
/// exist on that side; `Some(ObjectId::NULL)` is a tree without a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlteredTree {
    pub path: String,
    pub old_metadata: Option<ObjectId>,
    pub new_metadata: Option<ObjectId>,
}

impl AlteredTree {
    pub fn new(
        path: impl Into<String>,
        old_metadata: Option<ObjectId>,
        new_metadata: Option<ObjectId>,
    ) -> Self {
        Self {
            path: path.into(),
            old_metadata,
            new_metadata,
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.path.clone(), self.new_metadata, self.old_metadata)
    }
}

impl fmt::Display for AlteredTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |m: Option<ObjectId>| m.map_or_else(|| "-".to_string(), |id| id.short_hex());
        write!(
            f,
            "{} {} -> {}",
            self.path,
            side(self.old_metadata),
            side(self.new_metadata)
        )
    }
}

/// A set of changes that can be serialized and applied elsewhere.
///
/// The patch keeps every feature type its changes refer to, so it can be
/// applied to a repository that has never seen them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    feature_types: Vec<RevFeatureType>,
    added: Vec<PatchFeature>,
    removed: Vec<PatchFeature>,
    modified: Vec<FeatureDiff>,
    altered_trees: Vec<AlteredTree>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added_features(&self) -> &[PatchFeature] {
        &self.added
    }

    pub fn removed_features(&self) -> &[PatchFeature] {
        &self.removed
    }

    pub fn modified_features(&self) -> &[FeatureDiff] {
        &self.modified
    }

    pub fn altered_trees(&self) -> &[AlteredTree] {
        &self.altered_trees
    }

    pub fn feature_types(&self) -> &[RevFeatureType] {
        &self.feature_types
    }

    /// The feature type with id `id`, if the patch carries it.
    pub fn feature_type(&self, id: &ObjectId) -> Option<&RevFeatureType> {
        self.feature_types.iter().find(|ft| ft.id() == *id)
    }

    pub fn add_feature_type(&mut self, feature_type: RevFeatureType) {
        if self.feature_type(&feature_type.id()).is_none() {
            self.feature_types.push(feature_type);
        }
    }

    pub fn add_added_feature(
        &mut self,
        path: impl Into<String>,
        feature: RevFeature,
        feature_type: RevFeatureType,
    ) {
        self.add_feature_type(feature_type.clone());
        self.added.push(PatchFeature {
            path: path.into(),
            feature,
            feature_type,
        });
    }

    pub fn add_removed_feature(
        &mut self,
        path: impl Into<String>,
        feature: RevFeature,
        feature_type: RevFeatureType,
    ) {
        self.add_feature_type(feature_type.clone());
        self.removed.push(PatchFeature {
            path: path.into(),
            feature,
            feature_type,
        });
    }

    pub fn add_modified_feature(&mut self, diff: FeatureDiff) {
        self.add_feature_type(diff.old_type().clone());
        self.add_feature_type(diff.new_type().clone());
        self.modified.push(diff);
    }

    /// Record a tree change. Feature types it names must be added
    /// separately.
    pub fn add_altered_tree(&mut self, tree: AlteredTree) {
        self.altered_trees.push(tree);
    }

    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of feature and tree changes.
    pub fn count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.altered_trees.len()
    }

    /// The patch that undoes this one.
    pub fn reversed(&self) -> Self {
        Self {
            feature_types: self.feature_types.clone(),
            added: self.removed.clone(),
            removed: self.added.clone(),
            modified: self.modified.iter().map(FeatureDiff::reversed).collect(),
            altered_trees: self.altered_trees.iter().map(AlteredTree::reversed).collect(),
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for feature in &self.added {
            writeln!(f, "A {}", feature.path)?;
        }
        for feature in &self.removed {
            writeln!(f, "R {}", feature.path)?;
        }
        for diff in &self.modified {
            writeln!(f, "M {}", diff.path())?;
            for line in diff.to_string().lines() {
                writeln!(f, "    {line}")?;
            }
        }
        for tree in &self.altered_trees {
            writeln!(f, "T {tree}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_store::PropertyDescriptor;
    use gv_types::{FieldType, Value};

    fn points() -> RevFeatureType {
        RevFeatureType::new("points", vec![PropertyDescriptor::new("n", FieldType::Integer)])
    }

    #[test]
    fn feature_types_are_deduplicated() {
        let mut patch = Patch::new();
        patch.add_added_feature("points/a", RevFeature::of([Value::from(1)]), points());
        patch.add_removed_feature("points/b", RevFeature::of([Value::from(2)]), points());
        assert_eq!(patch.feature_types().len(), 1);
        assert!(patch.feature_type(&points().id()).is_some());
        assert_eq!(patch.count(), 2);
    }

    #[test]
    fn reversing_swaps_added_and_removed() {
        let mut patch = Patch::new();
        patch.add_added_feature("points/a", RevFeature::of([Value::from(1)]), points());
        patch.add_altered_tree(AlteredTree::new("points", None, Some(points().id())));
        let reversed = patch.reversed();
        assert!(reversed.added_features().is_empty());
        assert_eq!(reversed.removed_features()[0].path, "points/a");
        assert_eq!(reversed.altered_trees()[0].old_metadata, Some(points().id()));
        assert_eq!(reversed.altered_trees()[0].new_metadata, None);
        assert_eq!(reversed.reversed(), patch);
    }

    #[test]
    fn empty_patch() {
        let patch = Patch::new();
        assert!(patch.is_empty());
        assert_eq!(patch.to_string(), "");
    }
}
