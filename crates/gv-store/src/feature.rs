use gv_types::{Envelope, FieldType, ObjectId, Value};
use serde::{Deserialize, Serialize};

use crate::hash;

// ---------------------------------------------------------------------------
// RevFeature
// ---------------------------------------------------------------------------

/// An immutable ordered list of attribute values.
///
/// Values are positional: the `i`-th value belongs to the `i`-th descriptor of
/// the feature's [`RevFeatureType`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevFeature {
    #[serde(skip)]
    id: ObjectId,
    values: Vec<Option<Value>>,
}

impl RevFeature {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        let mut feature = Self {
            id: ObjectId::NULL,
            values,
        };
        feature.id = hash::feature_id(&feature);
        feature
    }

    /// Build a feature from present values only.
    pub fn of(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(values.into_iter().map(Some).collect())
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Value at `index`; `None` when absent or out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Union of the envelopes of every geometry attribute.
    pub fn bounds(&self) -> Option<Envelope> {
        self.values
            .iter()
            .flatten()
            .filter_map(Value::as_geometry)
            .fold(None, |acc, g| Envelope::merge(acc, g.envelope().as_ref()))
    }

    pub(crate) fn rehash(mut self) -> Self {
        self.id = hash::feature_id(&self);
        self
    }
}

impl PartialEq for RevFeature {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RevFeature {}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// One attribute of a feature type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub binding: FieldType,
    pub nillable: bool,
    pub min_occurs: u32,
    pub max_occurs: u32,
    /// Coordinate reference system identifier, for geometry attributes.
    pub crs: Option<String>,
}

impl PropertyDescriptor {
    /// A nillable, single-valued attribute.
    pub fn new(name: impl Into<String>, binding: FieldType) -> Self {
        Self {
            name: name.into(),
            binding,
            nillable: true,
            min_occurs: 0,
            max_occurs: 1,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.nillable = false;
        self.min_occurs = 1;
        self
    }

    pub fn is_geometry(&self) -> bool {
        self.binding.is_geometry()
    }
}

// ---------------------------------------------------------------------------
// RevFeatureType
// ---------------------------------------------------------------------------

/// An immutable schema: a name and an ordered list of property descriptors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevFeatureType {
    #[serde(skip)]
    id: ObjectId,
    name: String,
    descriptors: Vec<PropertyDescriptor>,
}

impl RevFeatureType {
    pub fn new(name: impl Into<String>, descriptors: Vec<PropertyDescriptor>) -> Self {
        let mut ft = Self {
            id: ObjectId::NULL,
            name: name.into(),
            descriptors,
        };
        ft.id = hash::feature_type_id(&ft);
        ft
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    /// Position and descriptor of the attribute called `name`.
    pub fn descriptor(&self, name: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.name == name)
    }

    /// Position of a descriptor equal to `descriptor`.
    pub fn index_of(&self, descriptor: &PropertyDescriptor) -> Option<usize> {
        self.descriptors.iter().position(|d| d == descriptor)
    }

    /// The first geometry attribute, if any.
    pub fn geometry_descriptor(&self) -> Option<(usize, &PropertyDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.is_geometry())
    }

    pub(crate) fn rehash(mut self) -> Self {
        self.id = hash::feature_type_id(&self);
        self
    }
}

impl PartialEq for RevFeatureType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RevFeatureType {}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_types::Geometry;

    fn road_type() -> RevFeatureType {
        RevFeatureType::new(
            "road",
            vec![
                PropertyDescriptor::new("geom", FieldType::Geometry).with_crs("EPSG:4326"),
                PropertyDescriptor::new("name", FieldType::String),
                PropertyDescriptor::new("lanes", FieldType::Integer).required(),
            ],
        )
    }

    #[test]
    fn identical_features_share_an_id() {
        let a = RevFeature::of([Value::Integer(1), Value::from("x")]);
        let b = RevFeature::of([Value::Integer(1), Value::from("x")]);
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn bounds_cover_every_geometry() {
        let feature = RevFeature::of([
            Value::Geometry(Geometry::point(1.0, 5.0)),
            Value::from("x"),
            Value::Geometry(Geometry::line_string(&[(-2.0, 0.0), (3.0, 1.0)])),
        ]);
        let bounds = feature.bounds().unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (-2.0, 3.0));
        assert_eq!((bounds.min_y, bounds.max_y), (0.0, 5.0));
        assert!(RevFeature::of([Value::from("x")]).bounds().is_none());
    }

    #[test]
    fn any_value_change_changes_the_id() {
        let a = RevFeature::of([Value::Integer(1), Value::from("x")]);
        let b = RevFeature::of([Value::Integer(1), Value::from("y")]);
        let c = RevFeature::new(vec![Some(Value::Integer(1)), None]);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn absent_values_read_as_none() {
        let f = RevFeature::new(vec![None, Some(Value::Integer(3))]);
        assert_eq!(f.get(0), None);
        assert_eq!(f.get(1), Some(&Value::Integer(3)));
        assert_eq!(f.get(5), None);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn descriptor_lookup() {
        let ft = road_type();
        let (idx, d) = ft.descriptor("lanes").unwrap();
        assert_eq!(idx, 2);
        assert!(!d.nillable);
        assert!(ft.descriptor("missing").is_none());
        assert_eq!(ft.geometry_descriptor().unwrap().0, 0);
    }

    #[test]
    fn feature_type_id_covers_descriptors() {
        let a = road_type();
        let b = RevFeatureType::new(
            "road",
            vec![PropertyDescriptor::new("geom", FieldType::Geometry)],
        );
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), road_type().id());
    }

    #[test]
    fn geometry_values_hash() {
        let a = RevFeature::of([Value::from(Geometry::point(1.0, 2.0))]);
        let b = RevFeature::of([Value::from(Geometry::point(1.0, 2.5))]);
        assert_ne!(a.id(), b.id());
    }
}
