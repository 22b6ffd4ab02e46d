use gv_types::{Coordinate, Envelope, Geometry, ObjectId, Value};
use sha1::{Digest, Sha1};

/// Bytes fed in place of an absent optional field or a NULL object id.
///
/// Part of the hash format: changing it changes every object id.
pub const NULL_BYTE_CODE: [u8; 11] = [
    0x60, 0xe5, 0x6d, 0x08, 0xd3, 0x08, 0x53, 0xb7, 0x84, 0x07, 0x77,
];

/// Incremental SHA-1 funnel producing an [`ObjectId`].
///
/// Multi-byte integers and floats are written big-endian. Strings are written
/// as a 4-byte length followed by their UTF-8 bytes.
#[derive(Clone, Default)]
pub struct ObjectHasher {
    digest: Sha1,
}

impl ObjectHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.digest.update(bytes);
        self
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.put_bytes(&[v])
    }

    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.put_u8(u8::from(v))
    }

    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_i64(&mut self, v: i64) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_f64(&mut self, v: f64) -> &mut Self {
        self.put_bytes(&v.to_bits().to_be_bytes())
    }

    /// A collection length. Lengths beyond `u32::MAX` are not representable
    /// in the format and saturate.
    pub fn put_len(&mut self, len: usize) -> &mut Self {
        self.put_u32(u32::try_from(len).unwrap_or(u32::MAX))
    }

    pub fn put_str(&mut self, s: &str) -> &mut Self {
        self.put_len(s.len());
        self.put_bytes(s.as_bytes())
    }

    pub fn put_null(&mut self) -> &mut Self {
        self.put_bytes(&NULL_BYTE_CODE)
    }

    /// An optional string; `None` is written as [`NULL_BYTE_CODE`].
    pub fn put_optional_str(&mut self, s: Option<&str>) -> &mut Self {
        match s {
            Some(s) => self.put_str(s),
            None => self.put_null(),
        }
    }

    /// Feed any [`Funnel`] value.
    pub fn put<F: Funnel + ?Sized>(&mut self, value: &F) -> &mut Self {
        value.funnel(self);
        self
    }

    /// Consume the hasher and return the digest as an id.
    pub fn finish(self) -> ObjectId {
        let digest = self.digest.finalize();
        let mut raw = [0u8; ObjectId::NUM_BYTES];
        raw.copy_from_slice(&digest);
        ObjectId::new(raw)
    }
}

impl std::fmt::Debug for ObjectHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHasher").finish_non_exhaustive()
    }
}

/// A value with a canonical encoding in the hash funnel.
pub trait Funnel {
    fn funnel(&self, hasher: &mut ObjectHasher);
}

impl Funnel for str {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher.put_str(self);
    }
}

impl Funnel for String {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher.put_str(self);
    }
}

impl Funnel for ObjectId {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        if self.is_null() {
            hasher.put_null();
        } else {
            hasher.put_bytes(self.as_bytes());
        }
    }
}

impl Funnel for Envelope {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher
            .put_f64(self.min_x)
            .put_f64(self.max_x)
            .put_f64(self.min_y)
            .put_f64(self.max_y);
    }
}

/// An absent envelope is written as four NaNs.
impl Funnel for Option<Envelope> {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        match self {
            Some(env) => env.funnel(hasher),
            None => {
                for _ in 0..4 {
                    hasher.put_f64(f64::NAN);
                }
            }
        }
    }
}

impl Funnel for Coordinate {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher.put_f64(self.x).put_f64(self.y);
    }
}

impl Funnel for Geometry {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher.put_str(self.geometry_type());
        let parts = self.parts();
        hasher.put_len(parts.len());
        for part in &parts {
            hasher.put_len(part.len());
            for path in part {
                hasher.put_len(path.len());
                for c in path {
                    c.funnel(hasher);
                }
            }
        }
    }
}

impl Funnel for Value {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        hasher.put_u8(self.field_type().tag());
        match self {
            Value::Boolean(v) => {
                hasher.put_bool(*v);
            }
            Value::Byte(v) => {
                hasher.put_bytes(&v.to_be_bytes());
            }
            Value::Short(v) => {
                hasher.put_bytes(&v.to_be_bytes());
            }
            Value::Integer(v) => {
                hasher.put_i32(*v);
            }
            Value::Long(v) => {
                hasher.put_i64(*v);
            }
            Value::Float(v) => {
                hasher.put_bytes(&v.to_bits().to_be_bytes());
            }
            Value::Double(v) => {
                hasher.put_f64(*v);
            }
            Value::String(v) => {
                hasher.put_str(v);
            }
            Value::Uuid(v) => {
                hasher.put_bytes(v.as_bytes());
            }
            Value::Bytes(v) => {
                hasher.put_len(v.len()).put_bytes(v);
            }
            Value::Geometry(g) => g.funnel(hasher),
        }
    }
}

/// An absent attribute is written as the NULL field tag.
impl Funnel for Option<Value> {
    fn funnel(&self, hasher: &mut ObjectHasher) {
        match self {
            Some(v) => v.funnel(hasher),
            None => {
                hasher.put_u8(gv_types::FieldType::Null.tag());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hash_of<F: Funnel + ?Sized>(value: &F) -> ObjectId {
        let mut h = ObjectHasher::new();
        h.put(value);
        h.finish()
    }

    #[test]
    fn empty_funnel_is_sha1_of_nothing() {
        assert_eq!(
            ObjectHasher::new().finish().to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn raw_bytes_match_plain_sha1() {
        let mut h = ObjectHasher::new();
        h.put_bytes(b"abc");
        assert_eq!(h.finish(), ObjectId::for_string("abc"));
    }

    #[test]
    fn strings_are_length_prefixed() {
        // ("ab", "c") and ("a", "bc") must not collide.
        let mut h1 = ObjectHasher::new();
        h1.put_str("ab").put_str("c");
        let mut h2 = ObjectHasher::new();
        h2.put_str("a").put_str("bc");
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn null_id_hashes_as_null_code() {
        let mut expected = ObjectHasher::new();
        expected.put_bytes(&NULL_BYTE_CODE);
        assert_eq!(hash_of(&ObjectId::NULL), expected.finish());
    }

    #[test]
    fn absent_and_present_optionals_differ() {
        let mut h1 = ObjectHasher::new();
        h1.put_optional_str(None);
        let mut h2 = ObjectHasher::new();
        h2.put_optional_str(Some(""));
        assert_ne!(h1.finish(), h2.finish());

        let env: Option<Envelope> = Some(Envelope::of_point(0.0, 0.0));
        assert_ne!(hash_of(&env), hash_of(&None::<Envelope>));
    }

    #[test]
    fn values_of_different_types_differ() {
        assert_ne!(hash_of(&Value::Integer(1)), hash_of(&Value::Long(1)));
        assert_ne!(hash_of(&Value::Integer(1)), hash_of(&None::<Value>));
    }

    #[test]
    fn geometry_type_is_part_of_hash() {
        let line = Geometry::line_string(&[(0.0, 0.0)]);
        let multi = Geometry::MultiPoint(vec![Coordinate::new(0.0, 0.0)]);
        assert_ne!(hash_of(&line), hash_of(&multi));
    }

    proptest! {
        #[test]
        fn funnel_is_deterministic(s in ".*", n in any::<i64>()) {
            let mut h1 = ObjectHasher::new();
            h1.put_str(&s).put_i64(n);
            let mut h2 = ObjectHasher::new();
            h2.put_str(&s).put_i64(n);
            prop_assert_eq!(h1.finish(), h2.finish());
        }
    }
}
