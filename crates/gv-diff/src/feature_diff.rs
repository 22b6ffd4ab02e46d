//! Attribute-level difference between two versions of a feature.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use gv_store::{RevFeature, RevFeatureType};
use gv_types::Value;

use crate::attribute_diff::AttributeDiff;
use crate::error::{DiffError, DiffResult};

/// Per-attribute changes of the feature at `path`, keyed by attribute name.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureDiff {
    path: String,
    diffs: BTreeMap<String, AttributeDiff>,
    old_type: RevFeatureType,
    new_type: RevFeatureType,
}

impl FeatureDiff {
    pub fn new(
        path: impl Into<String>,
        diffs: BTreeMap<String, AttributeDiff>,
        old_type: RevFeatureType,
        new_type: RevFeatureType,
    ) -> Self {
        Self {
            path: path.into(),
            diffs,
            old_type,
            new_type,
        }
    }

    /// Compares `old` and `new` attribute by attribute, matching descriptors
    /// by name. With `all` set, unchanged attributes are included too.
    pub fn compute(
        path: impl Into<String>,
        old: &RevFeature,
        new: &RevFeature,
        old_type: &RevFeatureType,
        new_type: &RevFeatureType,
        all: bool,
    ) -> Self {
        let mut diffs = BTreeMap::new();
        let mut matched = BTreeSet::new();
        for (i, descriptor) in old_type.descriptors().iter().enumerate() {
            let old_value = old.get(i);
            let (new_value, geometry) = match new_type.descriptor(&descriptor.name) {
                Some((j, other)) => {
                    matched.insert(j);
                    (new.get(j), descriptor.is_geometry() && other.is_geometry())
                }
                None => (None, descriptor.is_geometry()),
            };
            if all || old_value != new_value {
                diffs.insert(
                    descriptor.name.clone(),
                    AttributeDiff::compute(old_value, new_value, geometry),
                );
            }
        }
        for (j, descriptor) in new_type.descriptors().iter().enumerate() {
            if matched.contains(&j) {
                continue;
            }
            let new_value = new.get(j);
            if all || new_value.is_some() {
                diffs.insert(
                    descriptor.name.clone(),
                    AttributeDiff::compute(None, new_value, descriptor.is_geometry()),
                );
            }
        }
        Self::new(path, diffs, old_type.clone(), new_type.clone())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn diffs(&self) -> &BTreeMap<String, AttributeDiff> {
        &self.diffs
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeDiff> {
        self.diffs.get(attribute)
    }

    pub fn old_type(&self) -> &RevFeatureType {
        &self.old_type
    }

    pub fn new_type(&self) -> &RevFeatureType {
        &self.new_type
    }

    /// Returns `true` if any attribute differs or the feature type changed.
    pub fn has_differences(&self) -> bool {
        self.old_type.id() != self.new_type.id()
            || self.diffs.values().any(AttributeDiff::is_change)
    }

    pub fn reversed(&self) -> Self {
        Self {
            path: self.path.clone(),
            diffs: self
                .diffs
                .iter()
                .map(|(name, d)| (name.clone(), d.reversed()))
                .collect(),
            old_type: self.new_type.clone(),
            new_type: self.old_type.clone(),
        }
    }

    /// Returns `true` if some attribute changed by both diffs conflicts.
    pub fn conflicts(&self, other: &FeatureDiff) -> bool {
        self.diffs.iter().any(|(name, diff)| {
            other
                .diffs
                .get(name)
                .is_some_and(|theirs| diff.conflicts(theirs))
        })
    }

    fn old_value<'f>(&self, feature: &'f RevFeature, name: &str) -> Option<&'f Value> {
        self.old_type
            .descriptor(name)
            .and_then(|(i, _)| feature.get(i))
    }

    /// Returns `true` if every attribute diff applies to `feature`, read
    /// with the old feature type.
    pub fn can_be_applied_on(&self, feature: &RevFeature) -> bool {
        self.diffs
            .iter()
            .all(|(name, diff)| diff.can_be_applied_on(self.old_value(feature, name)))
    }

    /// Applies the attribute diffs to `feature`, producing a feature laid out
    /// by the new feature type.
    pub fn apply_on(&self, feature: &RevFeature) -> DiffResult<RevFeature> {
        let values = self
            .new_type
            .descriptors()
            .iter()
            .map(|descriptor| {
                let current = self.old_value(feature, &descriptor.name);
                match self.diffs.get(&descriptor.name) {
                    Some(diff) => diff.apply_on(current).map_err(|e| match e {
                        DiffError::CannotApply(reason) => DiffError::CannotApply(format!(
                            "{}: attribute {}: {reason}",
                            self.path, descriptor.name
                        )),
                        other => other,
                    }),
                    None => Ok(current.cloned()),
                }
            })
            .collect::<DiffResult<Vec<_>>>()?;
        Ok(RevFeature::new(values))
    }

    /// One `name<TAB>attribute diff` line per attribute.
    pub fn as_text(&self) -> String {
        self.diffs
            .iter()
            .map(|(name, diff)| format!("{name}\t{}\n", diff.as_text()))
            .collect()
    }

    /// Parse [`FeatureDiff::as_text`] output. Attribute bindings are taken
    /// from the new type, then the old one.
    pub fn parse(
        path: impl Into<String>,
        text: &str,
        old_type: RevFeatureType,
        new_type: RevFeatureType,
    ) -> DiffResult<Self> {
        let mut diffs = BTreeMap::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let (name, rest) = line
                .split_once('\t')
                .ok_or_else(|| DiffError::Parse(format!("attribute line '{line}'")))?;
            let binding = new_type
                .descriptor(name)
                .or_else(|| old_type.descriptor(name))
                .map(|(_, d)| d.binding)
                .ok_or_else(|| DiffError::Parse(format!("unknown attribute '{name}'")))?;
            diffs.insert(name.to_string(), AttributeDiff::parse(binding, rest)?);
        }
        Ok(Self::new(path, diffs, old_type, new_type))
    }
}

impl fmt::Display for FeatureDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, diff) in &self.diffs {
            writeln!(f, "{name}: {diff}")?;
        }
        Ok(())
    }
}
