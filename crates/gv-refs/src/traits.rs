//! The [`RefDatabase`] trait defining the reference storage interface.

use gv_types::ObjectId;

use crate::error::{RefError, RefResult};
use crate::names;
use crate::types::Ref;

/// Symbolic refs are followed at most this many times.
pub const MAX_SYMBOLIC_DEPTH: usize = 8;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`) and provide atomic
/// read/write/delete operations on individual refs. Names are full names:
/// well-known pointers such as `HEAD`, or paths under `refs/`.
pub trait RefDatabase: Send + Sync {
    /// Read a ref by its full name. Returns `Ok(None)` if it does not exist.
    fn get_ref(&self, name: &str) -> RefResult<Option<Ref>>;

    /// Create or replace a ref. Returns `true` if the stored ref changed.
    fn put_ref(&self, reference: Ref) -> RefResult<bool>;

    /// Delete a ref, returning it if it existed.
    fn remove_ref(&self, name: &str) -> RefResult<Option<Ref>>;

    /// All refs whose full name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> RefResult<Vec<Ref>>;

    /// Follow symbolic refs from `name` to the direct ref they end at.
    ///
    /// Returns `Ok(None)` if `name`, or a ref it points to, does not exist.
    fn resolve(&self, name: &str) -> RefResult<Option<Ref>> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.get_ref(&current)? {
                Some(Ref::Symbolic { target, .. }) => current = target,
                other => return Ok(other),
            }
        }
        Err(RefError::SymbolicLoop {
            name: name.to_string(),
        })
    }

    /// The object id `name` finally points to.
    fn resolve_id(&self, name: &str) -> RefResult<Option<ObjectId>> {
        Ok(self.resolve(name)?.and_then(|r| r.object_id()))
    }

    /// Find a ref by full or short name, trying `name`, `refs/<name>`,
    /// `refs/tags/<name>`, `refs/heads/<name>` and `refs/remotes/<name>`.
    fn find(&self, name: &str) -> RefResult<Option<Ref>> {
        for candidate in names::candidates(name) {
            if let Some(found) = self.get_ref(&candidate)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Point `name` at `object_id`. When `name` is symbolic, the ref at the
    /// end of the chain is updated instead.
    fn update_ref(&self, name: &str, object_id: ObjectId) -> RefResult<()> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.get_ref(&current)? {
                Some(Ref::Symbolic { target, .. }) => current = target,
                _ => {
                    self.put_ref(Ref::direct(current, object_id))?;
                    return Ok(());
                }
            }
        }
        Err(RefError::SymbolicLoop {
            name: name.to_string(),
        })
    }

    /// Make `name` a symbolic ref to `target`.
    fn set_symbolic(&self, name: &str, target: &str) -> RefResult<()> {
        names::validate_ref_name(target)?;
        self.put_ref(Ref::symbolic(name, target))?;
        Ok(())
    }

    /// Direct refs pointing at `object_id`.
    fn refs_pointing_to(&self, object_id: &ObjectId) -> RefResult<Vec<Ref>> {
        Ok(self
            .list_refs("")?
            .into_iter()
            .filter(|r| r.object_id() == Some(*object_id))
            .collect())
    }

    fn branches(&self) -> RefResult<Vec<Ref>> {
        self.list_refs(names::HEADS_PREFIX)
    }

    fn tags(&self) -> RefResult<Vec<Ref>> {
        self.list_refs(names::TAGS_PREFIX)
    }
}
