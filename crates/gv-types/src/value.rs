//! Typed feature attribute values and their canonical text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TypeError, TypeResult};
use crate::geometry::Geometry;

/// Marker written in place of an absent value in attribute-level text.
pub const NULL_VALUE_MARKER: &str = "\\N";

/// Type tag written in place of a whole attribute when it is absent.
pub const NULL_ATTRIBUTE: &str = "NULL";

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// The binding of an attribute: the kind of value it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    Null,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    Uuid,
    Bytes,
    Geometry,
}

impl FieldType {
    /// Stable numeric tag, part of the hash funnel.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean => 1,
            Self::Byte => 2,
            Self::Short => 3,
            Self::Integer => 4,
            Self::Long => 5,
            Self::Float => 6,
            Self::Double => 7,
            Self::String => 8,
            Self::Uuid => 9,
            Self::Bytes => 10,
            Self::Geometry => 11,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
            Self::Integer => "INTEGER",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::Uuid => "UUID",
            Self::Bytes => "BYTES",
            Self::Geometry => "GEOMETRY",
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, Self::Geometry)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s {
            "NULL" => Self::Null,
            "BOOLEAN" => Self::Boolean,
            "BYTE" => Self::Byte,
            "SHORT" => Self::Short,
            "INTEGER" => Self::Integer,
            "LONG" => Self::Long,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "STRING" => Self::String,
            "UUID" => Self::Uuid,
            "BYTES" => Self::Bytes,
            "GEOMETRY" => Self::Geometry,
            other => return Err(TypeError::UnknownFieldType(other.to_string())),
        };
        Ok(t)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single attribute value of a feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Byte(_) => FieldType::Byte,
            Self::Short(_) => FieldType::Short,
            Self::Integer(_) => FieldType::Integer,
            Self::Long(_) => FieldType::Long,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::String(_) => FieldType::String,
            Self::Uuid(_) => FieldType::Uuid,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Geometry(_) => FieldType::Geometry,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Self::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Canonical single-line text of the value. Strings are escaped so the
    /// result never contains a tab or line break.
    pub fn to_text(&self) -> String {
        match self {
            Self::Boolean(v) => v.to_string(),
            Self::Byte(v) => v.to_string(),
            Self::Short(v) => v.to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::String(v) => escape_text(v),
            Self::Uuid(v) => v.to_string(),
            Self::Bytes(v) => hex::encode(v),
            Self::Geometry(g) => g.to_wkt(),
        }
    }

    /// Parse the output of [`Value::to_text`] for the given binding.
    pub fn parse(field_type: FieldType, text: &str) -> TypeResult<Value> {
        let invalid = || TypeError::InvalidValue {
            field_type: field_type.name().to_string(),
            text: text.to_string(),
        };
        let value = match field_type {
            FieldType::Null => return Err(invalid()),
            FieldType::Boolean => Self::Boolean(text.parse().map_err(|_| invalid())?),
            FieldType::Byte => Self::Byte(text.parse().map_err(|_| invalid())?),
            FieldType::Short => Self::Short(text.parse().map_err(|_| invalid())?),
            FieldType::Integer => Self::Integer(text.parse().map_err(|_| invalid())?),
            FieldType::Long => Self::Long(text.parse().map_err(|_| invalid())?),
            FieldType::Float => Self::Float(text.parse().map_err(|_| invalid())?),
            FieldType::Double => Self::Double(text.parse().map_err(|_| invalid())?),
            FieldType::String => Self::String(unescape_text(text).ok_or_else(invalid)?),
            FieldType::Uuid => Self::Uuid(Uuid::parse_str(text).map_err(|_| invalid())?),
            FieldType::Bytes => Self::Bytes(hex::decode(text).map_err(|_| invalid())?),
            FieldType::Geometry => Self::Geometry(Geometry::from_wkt(text)?),
        };
        Ok(value)
    }

    /// Value text, or [`NULL_VALUE_MARKER`] when absent.
    pub fn optional_text(value: Option<&Value>) -> String {
        match value {
            Some(v) => v.to_text(),
            None => NULL_VALUE_MARKER.to_string(),
        }
    }

    /// Inverse of [`Value::optional_text`].
    pub fn parse_optional(field_type: FieldType, text: &str) -> TypeResult<Option<Value>> {
        if text == NULL_VALUE_MARKER {
            Ok(None)
        } else {
            Self::parse(field_type, text).map(Some)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Geometry> for Value {
    fn from(v: Geometry) -> Self {
        Self::Geometry(v)
    }
}

// ---------------------------------------------------------------------------
// Attribute text: `TYPE\tpayload` or `NULL`
// ---------------------------------------------------------------------------

/// Self-describing text of an optional attribute value.
pub fn encode_attribute(value: Option<&Value>) -> String {
    match value {
        Some(v) => format!("{}\t{}", v.field_type().name(), v.to_text()),
        None => NULL_ATTRIBUTE.to_string(),
    }
}

/// Inverse of [`encode_attribute`].
pub fn decode_attribute(text: &str) -> TypeResult<Option<Value>> {
    if text == NULL_ATTRIBUTE {
        return Ok(None);
    }
    let (type_name, payload) = text
        .split_once('\t')
        .ok_or_else(|| TypeError::Serialization(format!("malformed attribute '{text}'")))?;
    let field_type: FieldType = type_name.parse()?;
    Value::parse(field_type, payload).map(Some)
}

/// Escape backslashes, tabs, and line breaks.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_text`]; `None` on a malformed escape.
pub fn unescape_text(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn samples() -> Vec<Value> {
        vec![
            Value::Boolean(true),
            Value::Byte(-3),
            Value::Short(1200),
            Value::Integer(-42),
            Value::Long(9_000_000_000),
            Value::Float(1.25),
            Value::Double(0.1),
            Value::String("tab\there\nline \\ slash".into()),
            Value::Uuid(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)),
            Value::Bytes(vec![0, 1, 254, 255]),
            Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (1.5, 2.0)])),
        ]
    }

    #[test]
    fn text_roundtrip_for_every_type() {
        for v in samples() {
            let text = v.to_text();
            assert!(!text.contains('\t'), "{text}");
            assert!(!text.contains('\n'), "{text}");
            assert_eq!(Value::parse(v.field_type(), &text).unwrap(), v);
        }
    }

    #[test]
    fn attribute_encoding_roundtrip() {
        for v in samples() {
            let encoded = encode_attribute(Some(&v));
            assert_eq!(decode_attribute(&encoded).unwrap(), Some(v));
        }
        assert_eq!(encode_attribute(None), "NULL");
        assert_eq!(decode_attribute("NULL").unwrap(), None);
    }

    #[test]
    fn optional_text_uses_null_marker() {
        assert_eq!(Value::optional_text(None), "\\N");
        assert_eq!(Value::parse_optional(FieldType::Integer, "\\N").unwrap(), None);
        assert_eq!(
            Value::parse_optional(FieldType::Integer, "5").unwrap(),
            Some(Value::Integer(5))
        );
        // A literal "\N" string escapes to something else.
        let literal = Value::String("\\N".into());
        assert_ne!(Value::optional_text(Some(&literal)), NULL_VALUE_MARKER);
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        assert!(Value::parse(FieldType::Integer, "abc").is_err());
        assert!(Value::parse(FieldType::String, "bad\\q").is_err());
        assert!(Value::parse(FieldType::Null, "").is_err());
        assert!(decode_attribute("WIDGET\t1").is_err());
        assert!(decode_attribute("INTEGER").is_err());
    }

    #[test]
    fn field_type_names_roundtrip() {
        for v in samples() {
            let t = v.field_type();
            assert_eq!(t.name().parse::<FieldType>().unwrap(), t);
        }
        assert_eq!("NULL".parse::<FieldType>().unwrap(), FieldType::Null);
    }

    proptest! {
        #[test]
        fn any_string_survives_escaping(s in ".*") {
            let v = Value::String(s);
            prop_assert_eq!(Value::parse(FieldType::String, &v.to_text()).unwrap(), v);
        }

        #[test]
        fn any_double_survives_text(d in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let v = Value::Double(d);
            prop_assert_eq!(Value::parse(FieldType::Double, &v.to_text()).unwrap(), v);
        }
    }
}
