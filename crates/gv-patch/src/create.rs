//! Building a [`Patch`] from a tree diff.

use std::collections::HashMap;

use gv_diff::{DiffEntry, DiffResult, FeatureDiff};
use gv_store::{NodeRef, ObjectDatabase, RevFeatureType};
use gv_types::ObjectId;
use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::patch::{AlteredTree, Patch};

/// Collect the changes described by `entries` into a patch.
///
/// Tree entries are only needed for trees that appear, disappear, or change
/// their feature type; pass a diff that reports trees to capture them.
pub fn create_patch<I>(db: &dyn ObjectDatabase, entries: I) -> PatchResult<Patch>
where
    I: IntoIterator<Item = DiffResult<DiffEntry>>,
{
    let mut patch = Patch::new();
    let mut types = TypeCache::new(db);
    for entry in entries {
        let entry = entry?;
        if entry.is_tree() {
            add_tree(&mut patch, &mut types, &entry)?;
            continue;
        }
        match (entry.old(), entry.new_node()) {
            (None, Some(new)) => {
                let feature_type = types.of(new)?;
                patch.add_added_feature(new.path(), db.get_feature(&new.object_id())?, feature_type);
            }
            (Some(old), None) => {
                let feature_type = types.of(old)?;
                patch.add_removed_feature(old.path(), db.get_feature(&old.object_id())?, feature_type);
            }
            (Some(old), Some(new)) => {
                let diff = FeatureDiff::compute(
                    new.path(),
                    &db.get_feature(&old.object_id())?,
                    &db.get_feature(&new.object_id())?,
                    &types.of(old)?,
                    &types.of(new)?,
                    false,
                );
                patch.add_modified_feature(diff);
            }
            (None, None) => {}
        }
    }
    debug!(changes = patch.count(), "created patch");
    Ok(patch)
}

fn add_tree(patch: &mut Patch, types: &mut TypeCache<'_>, entry: &DiffEntry) -> PatchResult<()> {
    let old = entry.old().map(own_metadata);
    let new = entry.new_node().map(own_metadata);
    if old.is_some() && old == new {
        return Ok(());
    }
    for id in [old, new].into_iter().flatten().filter(|id| !id.is_null()) {
        patch.add_feature_type(types.get(id)?);
    }
    patch.add_altered_tree(AlteredTree::new(entry.path(), old, new));
    Ok(())
}

/// Metadata set on the tree node itself, ignoring what it inherits.
pub(crate) fn own_metadata(node: &NodeRef) -> ObjectId {
    node.node().metadata_id().unwrap_or(ObjectId::NULL)
}

struct TypeCache<'a> {
    db: &'a dyn ObjectDatabase,
    types: HashMap<ObjectId, RevFeatureType>,
}

impl<'a> TypeCache<'a> {
    fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self {
            db,
            types: HashMap::new(),
        }
    }

    fn of(&mut self, node: &NodeRef) -> PatchResult<RevFeatureType> {
        let id = node.metadata_id();
        if id.is_null() {
            return Err(PatchError::MissingFeatureType(node.path()));
        }
        self.get(id)
    }

    fn get(&mut self, id: ObjectId) -> PatchResult<RevFeatureType> {
        if let Some(ft) = self.types.get(&id) {
            return Ok(ft.clone());
        }
        let ft = self.db.get_feature_type(&id)?;
        self.types.insert(id, ft.clone());
        Ok(ft)
    }
}
