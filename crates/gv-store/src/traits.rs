use gv_types::{ObjectId, ObjectType};
use tracing::trace;

use crate::commit::RevCommit;
use crate::error::{StoreError, StoreResult};
use crate::feature::{RevFeature, RevFeatureType};
use crate::object::{RevObject, RevTag};
use crate::serialization::SerializationFactory;
use crate::tree::RevTree;

/// Content-addressed object database.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Content-addressing guarantees this:
///   the same content always produces the same id.
/// - `put` is idempotent: writing an object that already exists is a no-op.
/// - Concurrent reads are always safe (objects are immutable).
/// - The raw layer never interprets object bytes; typed access goes through
///   the database's [`SerializationFactory`].
pub trait ObjectDatabase: Send + Sync {
    /// Encoded bytes of an object, or `None` if absent.
    fn get_raw(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>>;

    /// Store encoded bytes under `id`. Returns `true` if newly inserted.
    fn put_raw(&self, id: &ObjectId, bytes: Vec<u8>) -> StoreResult<bool>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only; deleting a referenced object
    /// corrupts the history that references it.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// The codec used for typed access.
    fn serialization(&self) -> &dyn SerializationFactory;

    /// Ids of stored objects whose hex form starts with `prefix`.
    fn lookup(&self, prefix: &str) -> StoreResult<Vec<ObjectId>>;

    /// Decode an object, or `None` if absent.
    fn get_if_present(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        match self.get_raw(id)? {
            Some(bytes) => Ok(Some(self.serialization().decode(id, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode an object that must exist.
    fn get(&self, id: &ObjectId) -> StoreResult<RevObject> {
        self.get_if_present(id)?
            .ok_or(StoreError::NotFound(*id))
    }

    /// Encode and store an object. Returns `true` if newly inserted.
    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        let id = object.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        if self.exists(&id)? {
            return Ok(false);
        }
        trace!(object = %id.short_hex(), kind = %object.object_type(), "put");
        let bytes = self.serialization().encode(object)?;
        self.put_raw(&id, bytes)
    }

    /// Store several objects. Returns the number newly inserted.
    fn put_all(&self, objects: &[RevObject]) -> StoreResult<usize> {
        let mut inserted = 0;
        for object in objects {
            if self.put(object)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// A tree. The canonical empty tree is always available, stored or not.
    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        if *id == RevTree::empty_id() {
            return Ok(RevTree::empty().clone());
        }
        match self.get(id)? {
            RevObject::Tree(t) => Ok(t),
            other => Err(unexpected(id, ObjectType::Tree, &other)),
        }
    }

    fn get_commit(&self, id: &ObjectId) -> StoreResult<RevCommit> {
        match self.get(id)? {
            RevObject::Commit(c) => Ok(c),
            other => Err(unexpected(id, ObjectType::Commit, &other)),
        }
    }

    fn get_feature(&self, id: &ObjectId) -> StoreResult<RevFeature> {
        match self.get(id)? {
            RevObject::Feature(f) => Ok(f),
            other => Err(unexpected(id, ObjectType::Feature, &other)),
        }
    }

    fn get_feature_type(&self, id: &ObjectId) -> StoreResult<RevFeatureType> {
        match self.get(id)? {
            RevObject::FeatureType(ft) => Ok(ft),
            other => Err(unexpected(id, ObjectType::FeatureType, &other)),
        }
    }

    fn get_tag(&self, id: &ObjectId) -> StoreResult<RevTag> {
        match self.get(id)? {
            RevObject::Tag(t) => Ok(t),
            other => Err(unexpected(id, ObjectType::Tag, &other)),
        }
    }
}

fn unexpected(id: &ObjectId, expected: ObjectType, actual: &RevObject) -> StoreError {
    StoreError::UnexpectedType {
        id: *id,
        expected,
        actual: actual.object_type(),
    }
}
