//! Differences between two values of a single feature attribute.

use std::fmt;

use gv_types::{FieldType, Geometry, Value};

use crate::entry::ChangeType;
use crate::error::{DiffError, DiffResult};
use crate::geometry_diff::GeometryDiff;

const MISSING: &str = "[MISSING]";

/// The change of one attribute between two feature versions.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeDiff {
    Generic(GenericAttributeDiff),
    Geometry(GeometryAttributeDiff),
}

impl AttributeDiff {
    /// Diff `old` against `new`, using a geometry diff for geometry bindings.
    pub fn compute(old: Option<&Value>, new: Option<&Value>, geometry: bool) -> Self {
        let is_geometry = |v: Option<&Value>| v.map_or(true, |v| v.as_geometry().is_some());
        if geometry && is_geometry(old) && is_geometry(new) {
            let old = old.and_then(Value::as_geometry);
            let new = new.and_then(Value::as_geometry);
            return AttributeDiff::Geometry(GeometryAttributeDiff::new(old, new));
        }
        AttributeDiff::Generic(GenericAttributeDiff::new(old.cloned(), new.cloned()))
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            AttributeDiff::Generic(d) => d.change_type(),
            AttributeDiff::Geometry(d) => d.change_type(),
        }
    }

    /// Returns `false` for a diff between equal values.
    pub fn is_change(&self) -> bool {
        match self {
            AttributeDiff::Generic(d) => d.old != d.new,
            AttributeDiff::Geometry(GeometryAttributeDiff::Modified(d)) => !d.is_empty(),
            AttributeDiff::Geometry(_) => true,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            AttributeDiff::Generic(d) => AttributeDiff::Generic(d.reversed()),
            AttributeDiff::Geometry(d) => AttributeDiff::Geometry(d.reversed()),
        }
    }

    pub fn can_be_applied_on(&self, value: Option<&Value>) -> bool {
        match self {
            AttributeDiff::Generic(d) => d.can_be_applied_on(value),
            AttributeDiff::Geometry(d) => d.can_be_applied_on(value),
        }
    }

    pub fn apply_on(&self, value: Option<&Value>) -> DiffResult<Option<Value>> {
        match self {
            AttributeDiff::Generic(d) => d.apply_on(value),
            AttributeDiff::Geometry(d) => d.apply_on(value),
        }
    }

    /// Returns `true` if this diff and `other`, both taken from the same
    /// base value, cannot both be applied.
    pub fn conflicts(&self, other: &AttributeDiff) -> bool {
        match (self, other) {
            (AttributeDiff::Generic(a), AttributeDiff::Generic(b)) => a.conflicts(b),
            (AttributeDiff::Geometry(a), AttributeDiff::Geometry(b)) => a.conflicts(b),
            _ => true,
        }
    }

    /// Single-line text: a change code, a tab, and the code-specific fields.
    pub fn as_text(&self) -> String {
        match self {
            AttributeDiff::Generic(d) => d.as_text(),
            AttributeDiff::Geometry(d) => d.as_text(),
        }
    }

    /// Parse [`AttributeDiff::as_text`] output for an attribute of `binding`.
    pub fn parse(binding: FieldType, text: &str) -> DiffResult<Self> {
        if binding.is_geometry() {
            GeometryAttributeDiff::parse(text).map(AttributeDiff::Geometry)
        } else {
            GenericAttributeDiff::parse(binding, text).map(AttributeDiff::Generic)
        }
    }
}

impl fmt::Display for AttributeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeDiff::Generic(d) => d.fmt(f),
            AttributeDiff::Geometry(d) => d.fmt(f),
        }
    }
}

fn split_code(text: &str) -> DiffResult<(ChangeType, &str)> {
    let (code, rest) = text
        .split_once('\t')
        .ok_or_else(|| DiffError::Parse(format!("attribute diff '{text}'")))?;
    let change = ChangeType::from_code(code)
        .ok_or_else(|| DiffError::Parse(format!("unknown change code '{code}'")))?;
    Ok((change, rest))
}

/// Whole-value replacement of a non-geometry attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericAttributeDiff {
    old: Option<Value>,
    new: Option<Value>,
}

impl GenericAttributeDiff {
    pub fn new(old: Option<Value>, new: Option<Value>) -> Self {
        Self { old, new }
    }

    pub fn old_value(&self) -> Option<&Value> {
        self.old.as_ref()
    }

    pub fn new_value(&self) -> Option<&Value> {
        self.new.as_ref()
    }

    pub fn change_type(&self) -> ChangeType {
        match (&self.old, &self.new) {
            (_, None) => ChangeType::Removed,
            (None, _) => ChangeType::Added,
            _ => ChangeType::Modified,
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.new.clone(), self.old.clone())
    }

    pub fn can_be_applied_on(&self, value: Option<&Value>) -> bool {
        value == self.old.as_ref()
    }

    pub fn apply_on(&self, value: Option<&Value>) -> DiffResult<Option<Value>> {
        if !self.can_be_applied_on(value) {
            return Err(DiffError::CannotApply(format!(
                "expected {}, found {}",
                Value::optional_text(self.old.as_ref()),
                Value::optional_text(value)
            )));
        }
        Ok(self.new.clone())
    }

    pub fn conflicts(&self, other: &GenericAttributeDiff) -> bool {
        self.new != other.new
    }

    pub fn as_text(&self) -> String {
        let text = |v: &Option<Value>| Value::optional_text(v.as_ref());
        match self.change_type() {
            ChangeType::Modified => format!("M\t{}\t{}", text(&self.old), text(&self.new)),
            ChangeType::Added => format!("A\t{}", text(&self.new)),
            ChangeType::Removed => format!("R\t{}", text(&self.old)),
        }
    }

    pub fn parse(binding: FieldType, text: &str) -> DiffResult<Self> {
        let (change, rest) = split_code(text)?;
        let value = |s: &str| Value::parse_optional(binding, s).map_err(DiffError::from);
        match change {
            ChangeType::Modified => {
                let (old, new) = rest
                    .split_once('\t')
                    .ok_or_else(|| DiffError::Parse(format!("modification '{text}'")))?;
                Ok(Self::new(value(old)?, value(new)?))
            }
            ChangeType::Added => Ok(Self::new(None, value(rest)?)),
            ChangeType::Removed => Ok(Self::new(value(rest)?, None)),
        }
    }
}

impl fmt::Display for GenericAttributeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<Value>| v.as_ref().map_or(MISSING.to_string(), Value::to_text);
        write!(f, "{} -> {}", side(&self.old), side(&self.new))
    }
}

/// Change of a geometry attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryAttributeDiff {
    Added(Geometry),
    Removed(Geometry),
    Modified(GeometryDiff),
}

impl GeometryAttributeDiff {
    pub fn new(old: Option<&Geometry>, new: Option<&Geometry>) -> Self {
        match (old, new) {
            (None, Some(new)) => GeometryAttributeDiff::Added(new.clone()),
            (Some(old), None) => GeometryAttributeDiff::Removed(old.clone()),
            _ => GeometryAttributeDiff::Modified(GeometryDiff::compute(old, new)),
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            GeometryAttributeDiff::Added(_) => ChangeType::Added,
            GeometryAttributeDiff::Removed(_) => ChangeType::Removed,
            GeometryAttributeDiff::Modified(_) => ChangeType::Modified,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            GeometryAttributeDiff::Added(g) => GeometryAttributeDiff::Removed(g.clone()),
            GeometryAttributeDiff::Removed(g) => GeometryAttributeDiff::Added(g.clone()),
            GeometryAttributeDiff::Modified(d) => GeometryAttributeDiff::Modified(d.reversed()),
        }
    }

    pub fn can_be_applied_on(&self, value: Option<&Value>) -> bool {
        let geometry = match value {
            None => None,
            Some(Value::Geometry(g)) => Some(g),
            Some(_) => return false,
        };
        match self {
            GeometryAttributeDiff::Added(_) => geometry.is_none(),
            GeometryAttributeDiff::Removed(old) => geometry == Some(old),
            GeometryAttributeDiff::Modified(diff) => diff.can_be_applied_on(geometry),
        }
    }

    pub fn apply_on(&self, value: Option<&Value>) -> DiffResult<Option<Value>> {
        if !self.can_be_applied_on(value) {
            return Err(DiffError::CannotApply(format!(
                "geometry {} does not match",
                Value::optional_text(value)
            )));
        }
        match self {
            GeometryAttributeDiff::Added(g) => Ok(Some(Value::Geometry(g.clone()))),
            GeometryAttributeDiff::Removed(_) => Ok(None),
            GeometryAttributeDiff::Modified(diff) => {
                let geometry = value.and_then(Value::as_geometry);
                Ok(diff.apply_on(geometry)?.map(Value::Geometry))
            }
        }
    }

    pub fn conflicts(&self, other: &GeometryAttributeDiff) -> bool {
        use GeometryAttributeDiff::*;
        match (self, other) {
            (Removed(_), Removed(_)) => false,
            (Added(a), Added(b)) => a != b,
            (Modified(a), Modified(b)) => a.conflicts(b),
            _ => true,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            GeometryAttributeDiff::Added(g) => format!("A\t{}", g.to_wkt()),
            GeometryAttributeDiff::Removed(g) => format!("R\t{}", g.to_wkt()),
            GeometryAttributeDiff::Modified(d) => format!("M\t{}", d.as_text()),
        }
    }

    pub fn parse(text: &str) -> DiffResult<Self> {
        let (change, rest) = split_code(text)?;
        Ok(match change {
            ChangeType::Added => GeometryAttributeDiff::Added(Geometry::from_wkt(rest)?),
            ChangeType::Removed => GeometryAttributeDiff::Removed(Geometry::from_wkt(rest)?),
            ChangeType::Modified => GeometryAttributeDiff::Modified(GeometryDiff::parse(rest)?),
        })
    }
}

impl fmt::Display for GeometryAttributeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryAttributeDiff::Added(g) => write!(f, "{MISSING} -> {}", g.to_wkt()),
            GeometryAttributeDiff::Removed(g) => write!(f, "{} -> {MISSING}", g.to_wkt()),
            GeometryAttributeDiff::Modified(d) => d.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_diff_applies_only_to_its_old_value() {
        let diff = GenericAttributeDiff::new(Some(Value::Integer(5)), Some(Value::Integer(7)));
        assert_eq!(diff.change_type(), ChangeType::Modified);
        assert_eq!(
            diff.apply_on(Some(&Value::Integer(5))).unwrap(),
            Some(Value::Integer(7))
        );
        assert!(!diff.can_be_applied_on(Some(&Value::Integer(6))));
        assert!(matches!(
            diff.apply_on(Some(&Value::Integer(6))),
            Err(DiffError::CannotApply(_))
        ));
        assert_eq!(
            diff.reversed().apply_on(Some(&Value::Integer(7))).unwrap(),
            Some(Value::Integer(5))
        );
    }

    #[test]
    fn generic_change_types() {
        let added = GenericAttributeDiff::new(None, Some(Value::from("x")));
        let removed = GenericAttributeDiff::new(Some(Value::from("x")), None);
        assert_eq!(added.change_type(), ChangeType::Added);
        assert_eq!(removed.change_type(), ChangeType::Removed);
        assert_eq!(added.to_string(), "[MISSING] -> x");
        assert_eq!(removed.to_string(), "x -> [MISSING]");
    }

    #[test]
    fn generic_conflicts_compare_new_values() {
        let a = GenericAttributeDiff::new(Some(Value::Long(1)), Some(Value::Long(2)));
        let b = GenericAttributeDiff::new(Some(Value::Long(1)), Some(Value::Long(2)));
        let c = GenericAttributeDiff::new(Some(Value::Long(1)), Some(Value::Long(3)));
        assert!(!a.conflicts(&b));
        assert!(a.conflicts(&c));
    }

    #[test]
    fn text_round_trips_with_escapes() {
        let diffs = [
            AttributeDiff::compute(
                Some(&Value::from("tab\there")),
                Some(&Value::from("line\nbreak")),
                false,
            ),
            AttributeDiff::compute(None, Some(&Value::from("new")), false),
            AttributeDiff::compute(Some(&Value::from("gone")), None, false),
        ];
        for diff in diffs {
            let parsed = AttributeDiff::parse(FieldType::String, &diff.as_text()).unwrap();
            assert_eq!(parsed, diff);
        }
    }

    #[test]
    fn geometry_diffs_apply_and_reverse() {
        let old = Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (1.0, 1.0)]));
        let new = Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (2.0, 2.0)]));
        let diff = AttributeDiff::compute(Some(&old), Some(&new), true);
        assert!(matches!(
            diff,
            AttributeDiff::Geometry(GeometryAttributeDiff::Modified(_))
        ));
        assert_eq!(diff.apply_on(Some(&old)).unwrap(), Some(new.clone()));
        assert_eq!(diff.reversed().apply_on(Some(&new)).unwrap(), Some(old.clone()));
        assert!(!diff.can_be_applied_on(Some(&Value::Integer(1))));

        let parsed = AttributeDiff::parse(FieldType::Geometry, &diff.as_text()).unwrap();
        assert_eq!(parsed, diff);

        let added = AttributeDiff::compute(None, Some(&new), true);
        assert_eq!(added.change_type(), ChangeType::Added);
        assert_eq!(added.apply_on(None).unwrap(), Some(new.clone()));
        assert_eq!(added.reversed().apply_on(Some(&new)).unwrap(), None);
    }

    #[test]
    fn geometry_conflicts() {
        let g1 = Geometry::point(1.0, 1.0);
        let g2 = Geometry::point(2.0, 2.0);
        let removed = GeometryAttributeDiff::new(Some(&g1), None);
        assert!(!removed.conflicts(&removed.clone()));
        let add1 = GeometryAttributeDiff::new(None, Some(&g1));
        let add2 = GeometryAttributeDiff::new(None, Some(&g2));
        assert!(add1.conflicts(&add2));
        assert!(!add1.conflicts(&add1.clone()));
        assert!(removed.conflicts(&GeometryAttributeDiff::new(Some(&g1), Some(&g2))));

        let generic = AttributeDiff::Generic(GenericAttributeDiff::new(None, None));
        assert!(AttributeDiff::Geometry(add1).conflicts(&generic));
    }
}
