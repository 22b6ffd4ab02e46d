use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::TypeError;

/// Content-addressed identifier for any revision object.
///
/// An `ObjectId` is a 20-byte SHA-1 digest. Identical logical content always
/// produces the same `ObjectId`. The all-zero value is reserved as
/// [`ObjectId::NULL`] and denotes absence (or a tombstone in tree builders).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Number of raw bytes in an identifier.
    pub const NUM_BYTES: usize = 20;

    /// The null object ID (all zeros). Represents "no object".
    pub const NULL: ObjectId = ObjectId([0u8; 20]);

    /// Create an `ObjectId` from a pre-computed digest.
    pub const fn new(raw: [u8; 20]) -> Self {
        Self(raw)
    }

    /// Create an `ObjectId` from a raw byte slice of exactly 20 bytes.
    pub fn from_raw(raw: &[u8]) -> Result<Self, TypeError> {
        if raw.len() != Self::NUM_BYTES {
            return Err(TypeError::InvalidLength {
                expected: Self::NUM_BYTES,
                actual: raw.len(),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(raw);
        Ok(Self(arr))
    }

    /// SHA-1 of the UTF-8 bytes of an arbitrary string.
    ///
    /// Used for identities that are not revision objects (filters, test
    /// fixtures); revision objects are identified through the hash funnel.
    pub fn for_string(s: &str) -> Self {
        let digest = Sha1::digest(s.as_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// The null object ID.
    pub const fn null() -> Self {
        Self::NULL
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The raw 20-byte digest.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The byte at position `index`.
    pub fn byte_n(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Hex-encoded string representation (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Returns `true` if the hex form of this id starts with `prefix`.
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Parse from a hex string of exactly 40 characters.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != Self::NUM_BYTES * 2 {
            return Err(TypeError::InvalidLength {
                expected: Self::NUM_BYTES * 2,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_raw(&bytes)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for ObjectId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; 20] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// ObjectType
// ---------------------------------------------------------------------------

/// The kind of a revision object.
///
/// The numeric values are part of the hash funnel and of the binary
/// encoding tag; they must never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Commit,
    Tree,
    Feature,
    Tag,
    FeatureType,
}

impl ObjectType {
    /// Stable numeric value.
    pub fn value(&self) -> u8 {
        match self {
            Self::Commit => 0,
            Self::Tree => 1,
            Self::Feature => 2,
            Self::Tag => 3,
            Self::FeatureType => 4,
        }
    }

    /// Inverse of [`ObjectType::value`].
    pub fn from_value(value: u8) -> Result<Self, TypeError> {
        match value {
            0 => Ok(Self::Commit),
            1 => Ok(Self::Tree),
            2 => Ok(Self::Feature),
            3 => Ok(Self::Tag),
            4 => Ok(Self::FeatureType),
            other => Err(TypeError::UnknownObjectType(other.to_string())),
        }
    }

    /// Upper-case name used by the text encodings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Commit => "COMMIT",
            Self::Tree => "TREE",
            Self::Feature => "FEATURE",
            Self::Tag => "TAG",
            Self::FeatureType => "FEATURETYPE",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMMIT" => Ok(Self::Commit),
            "TREE" => Ok(Self::Tree),
            "FEATURE" => Ok(Self::Feature),
            "TAG" => Ok(Self::Tag),
            "FEATURETYPE" => Ok(Self::FeatureType),
            other => Err(TypeError::UnknownObjectType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_string_is_deterministic() {
        let id1 = ObjectId::for_string("hello world");
        let id2 = ObjectId::for_string("hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn for_string_matches_known_sha1() {
        let id = ObjectId::for_string("abc");
        assert_eq!(id.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn different_strings_produce_different_ids() {
        assert_ne!(ObjectId::for_string("hello"), ObjectId::for_string("world"));
    }

    #[test]
    fn null_is_all_zeros() {
        assert!(ObjectId::NULL.is_null());
        assert_eq!(ObjectId::null().as_bytes(), &[0u8; 20]);
        assert_eq!(ObjectId::default(), ObjectId::NULL);
        assert!(!ObjectId::for_string("x").is_null());
    }

    #[test]
    fn from_raw_requires_exact_length() {
        assert!(ObjectId::from_raw(&[1u8; 20]).is_ok());
        assert_eq!(
            ObjectId::from_raw(&[1u8; 19]).unwrap_err(),
            TypeError::InvalidLength {
                expected: 20,
                actual: 19
            }
        );
        assert!(ObjectId::from_raw(&[1u8; 32]).is_err());
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::for_string("test");
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
        let via_str: ObjectId = id.to_hex().parse().unwrap();
        assert_eq!(id, via_str);
    }

    #[test]
    fn from_hex_requires_exact_length() {
        let hex = ObjectId::for_string("test").to_hex();
        assert!(ObjectId::from_hex(&hex[..39]).is_err());
        assert!(ObjectId::from_hex(&format!("{hex}00")).is_err());
        assert!(matches!(
            ObjectId::from_hex(&"zz".repeat(20)),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(ObjectId::for_string("test").short_hex().len(), 8);
    }

    #[test]
    fn starts_with_hex_matches_prefix() {
        let id = ObjectId::for_string("abc");
        assert!(id.starts_with_hex("a9993e"));
        assert!(id.starts_with_hex("A9993E"));
        assert!(!id.starts_with_hex("a9993f"));
    }

    #[test]
    fn display_is_full_hex() {
        let id = ObjectId::for_string("test");
        let display = format!("{id}");
        assert_eq!(display.len(), 40);
        assert_eq!(display, id.to_hex());
        assert!(format!("{id:?}").starts_with("ObjectId("));
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::for_string("serde test");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_bytewise() {
        let id1 = ObjectId::new([0; 20]);
        let mut raw = [0u8; 20];
        raw[19] = 1;
        let id2 = ObjectId::new(raw);
        raw[0] = 1;
        let id3 = ObjectId::new(raw);
        assert!(id1 < id2);
        assert!(id2 < id3);
    }

    #[test]
    fn object_type_values_roundtrip() {
        for t in [
            ObjectType::Commit,
            ObjectType::Tree,
            ObjectType::Feature,
            ObjectType::Tag,
            ObjectType::FeatureType,
        ] {
            assert_eq!(ObjectType::from_value(t.value()).unwrap(), t);
            assert_eq!(t.name().parse::<ObjectType>().unwrap(), t);
        }
        assert!(ObjectType::from_value(9).is_err());
        assert!("BLOB".parse::<ObjectType>().is_err());
    }
}
