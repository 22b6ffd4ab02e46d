use std::collections::HashMap;
use std::sync::RwLock;

use gv_types::ObjectId;

use crate::error::StoreResult;
use crate::serialization::{BincodeSerializationFactory, SerializationFactory};
use crate::traits::ObjectDatabase;

/// In-memory, HashMap-based object database.
///
/// Intended for tests and embedding. Encoded objects are held behind a
/// `RwLock` for safe concurrent access.
pub struct InMemoryObjectDatabase {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    serialization: Box<dyn SerializationFactory>,
}

impl InMemoryObjectDatabase {
    /// Create an empty database using the binary codec.
    pub fn new() -> Self {
        Self::with_serialization(Box::new(BincodeSerializationFactory::new()))
    }

    /// Create an empty database using the given codec.
    pub fn with_serialization(serialization: Box<dyn SerializationFactory>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            serialization,
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total encoded bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    /// Remove all objects.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }

    /// Sorted list of all stored ids.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let map = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryObjectDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDatabase for InMemoryObjectDatabase {
    fn get_raw(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put_raw(&self, id: &ObjectId, bytes: Vec<u8>) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        if map.contains_key(id) {
            return Ok(false);
        }
        map.insert(*id, bytes);
        Ok(true)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn serialization(&self) -> &dyn SerializationFactory {
        self.serialization.as_ref()
    }

    fn lookup(&self, prefix: &str) -> StoreResult<Vec<ObjectId>> {
        let map = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = map
            .keys()
            .filter(|id| id.starts_with_hex(prefix))
            .copied()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectDatabase")
            .field("object_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{CommitBuilder, RevPerson};
    use crate::error::StoreError;
    use crate::feature::RevFeature;
    use crate::object::RevObject;
    use crate::text::TextSerializationFactory;
    use crate::tree::RevTree;
    use gv_types::{ObjectType, Value};

    fn feature(n: i32) -> RevObject {
        RevFeature::of([Value::Integer(n)]).into()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get_feature() {
        let db = InMemoryObjectDatabase::new();
        let obj = feature(1);
        assert!(db.put(&obj).unwrap());
        let read_back = db.get(&obj.id()).unwrap();
        assert_eq!(read_back, obj);
        assert_eq!(db.get_feature(&obj.id()).unwrap().get(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn put_is_idempotent() {
        let db = InMemoryObjectDatabase::new();
        assert!(db.put(&feature(1)).unwrap());
        assert!(!db.put(&feature(1)).unwrap());
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn missing_objects() {
        let db = InMemoryObjectDatabase::new();
        let id = ObjectId::for_string("nope");
        assert!(db.get_if_present(&id).unwrap().is_none());
        assert!(matches!(db.get(&id), Err(StoreError::NotFound(_))));
        assert!(!db.exists(&id).unwrap());
    }

    #[test]
    fn typed_getters_check_kind() {
        let db = InMemoryObjectDatabase::new();
        let obj = feature(2);
        db.put(&obj).unwrap();
        let err = db.get_commit(&obj.id()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnexpectedType {
                expected: ObjectType::Commit,
                actual: ObjectType::Feature,
                ..
            }
        ));
    }

    #[test]
    fn empty_tree_is_always_available() {
        let db = InMemoryObjectDatabase::new();
        let t = db.get_tree(&RevTree::empty_id()).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn delete_and_clear() {
        let db = InMemoryObjectDatabase::new();
        let obj = feature(3);
        db.put(&obj).unwrap();
        assert!(db.delete(&obj.id()).unwrap());
        assert!(!db.delete(&obj.id()).unwrap());
        db.put(&feature(4)).unwrap();
        db.put(&feature(5)).unwrap();
        assert_eq!(db.put_all(&[feature(5), feature(6)]).unwrap(), 1);
        assert_eq!(db.all_ids().len(), 3);
        db.clear();
        assert!(db.is_empty());
    }

    #[test]
    fn corrupt_bytes_are_detected() {
        let db = InMemoryObjectDatabase::new();
        let real = feature(7);
        let bytes = db.serialization().encode(&feature(8)).unwrap();
        db.put_raw(&real.id(), bytes).unwrap();
        assert!(matches!(
            db.get(&real.id()),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn works_with_text_codec() {
        let db = InMemoryObjectDatabase::with_serialization(Box::new(TextSerializationFactory));
        let commit: RevObject = CommitBuilder::new()
            .tree_id(RevTree::empty_id())
            .author(RevPerson::new(Some("a"), Some("a@b"), 1, 0))
            .build()
            .unwrap()
            .into();
        db.put(&commit).unwrap();
        assert_eq!(db.get_commit(&commit.id()).unwrap().message(), "");
        assert!(db.total_bytes() > 0);
        assert!(format!("{db:?}").contains("object_count"));
    }

    #[test]
    fn lookup_by_hex_prefix() {
        let db = InMemoryObjectDatabase::new();
        let (a, b) = (feature(10), feature(11));
        db.put(&a).unwrap();
        db.put(&b).unwrap();
        let hex = a.id().to_hex();
        assert_eq!(db.lookup(&hex[..8]).unwrap(), vec![a.id()]);
        assert_eq!(db.lookup("").unwrap().len(), 2);
        assert!(db.lookup(&ObjectId::for_string("x").to_hex()).unwrap().is_empty());
    }

    #[test]
    fn null_id_is_never_present() {
        let db = InMemoryObjectDatabase::new();
        assert!(db.get_if_present(&ObjectId::NULL).unwrap().is_none());
    }
}
