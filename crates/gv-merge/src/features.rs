//! Attribute-level merging of a feature changed on both sides.

use gv_diff::{AttributeDiff, FeatureDiff, GeometryAttributeDiff};
use gv_store::{NodeRef, ObjectDatabase, PropertyDescriptor, RevFeature, RevFeatureType};
use gv_types::{FieldType, Value};

use crate::error::MergeResult;

/// A feature version with the type it is read with.
pub(crate) struct Version {
    pub(crate) feature: RevFeature,
    pub(crate) feature_type: RevFeatureType,
}

impl Version {
    pub(crate) fn load(db: &dyn ObjectDatabase, node: &NodeRef) -> MergeResult<Self> {
        let feature = db.get_feature(&node.object_id())?;
        let metadata_id = node.metadata_id();
        let feature_type = if metadata_id.is_null() {
            positional_type(&feature)
        } else {
            db.get_feature_type(&metadata_id)?
        };
        Ok(Self {
            feature,
            feature_type,
        })
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.feature_type
            .descriptor(name)
            .and_then(|(i, _)| self.feature.get(i))
    }
}

/// Type for features stored without one: attributes named by position.
fn positional_type(feature: &RevFeature) -> RevFeatureType {
    let descriptors = feature
        .values()
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let binding = v.as_ref().map_or(FieldType::String, Value::field_type);
            PropertyDescriptor::new(i.to_string(), binding)
        })
        .collect();
    RevFeatureType::new("", descriptors)
}

pub(crate) fn feature_diff(path: &str, old: &Version, new: &Version) -> FeatureDiff {
    FeatureDiff::compute(
        path,
        &old.feature,
        &new.feature,
        &old.feature_type,
        &new.feature_type,
        false,
    )
}

/// Merge `ours` and `theirs`, both derived from `ancestor`, attribute by
/// attribute. Returns `None` when the two cannot be reconciled.
pub(crate) fn merge_features(
    path: &str,
    ancestor: &Version,
    ours: &Version,
    theirs: &Version,
) -> MergeResult<Option<RevFeature>> {
    if ours.feature_type.id() != theirs.feature_type.id() {
        return Ok(None);
    }
    let ours_diff = feature_diff(path, ancestor, ours);
    let theirs_diff = feature_diff(path, ancestor, theirs);
    let mut values = Vec::with_capacity(ours.feature_type.descriptors().len());
    for descriptor in ours.feature_type.descriptors() {
        let name = descriptor.name.as_str();
        let value = match (ours_diff.get(name), theirs_diff.get(name)) {
            (_, None) => ours.value(name).cloned(),
            (None, Some(_)) => theirs.value(name).cloned(),
            (Some(a), Some(b)) if a.conflicts(b) => return Ok(None),
            (
                Some(AttributeDiff::Geometry(GeometryAttributeDiff::Modified(a))),
                Some(AttributeDiff::Geometry(GeometryAttributeDiff::Modified(b))),
            ) if a != b => {
                let Some(both) = a.combine(b) else {
                    return Ok(None);
                };
                let base = ancestor.value(name).and_then(Value::as_geometry);
                match both.apply_on(base) {
                    Ok(geometry) => geometry.map(Value::Geometry),
                    Err(_) => return Ok(None),
                }
            }
            (Some(_), Some(_)) => ours.value(name).cloned(),
        };
        values.push(value);
    }
    Ok(Some(RevFeature::new(values)))
}
