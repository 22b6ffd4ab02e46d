//! In-memory reference database for testing and ephemeral use.
//!
//! [`InMemoryRefDatabase`] keeps all refs in a `BTreeMap` protected by a
//! `RwLock`, so listings come out sorted by name.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::trace;

use crate::error::{RefError, RefResult};
use crate::names::{self, validate_ref_name};
use crate::traits::RefDatabase;
use crate::types::Ref;

/// An in-memory implementation of [`RefDatabase`].
#[derive(Debug)]
pub struct InMemoryRefDatabase {
    refs: RwLock<BTreeMap<String, Ref>>,
}

impl InMemoryRefDatabase {
    /// Create an empty ref database.
    pub fn new() -> Self {
        Self {
            refs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a database with `HEAD` pointing at the unborn `master` branch.
    pub fn initialized() -> Self {
        let db = Self::new();
        db.refs.write().expect("lock poisoned").insert(
            names::HEAD.to_string(),
            Ref::symbolic(names::HEAD, names::MASTER),
        );
        db
    }

    pub fn len(&self) -> usize {
        self.refs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRefDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl RefDatabase for InMemoryRefDatabase {
    fn get_ref(&self, name: &str) -> RefResult<Option<Ref>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs.get(name).cloned())
    }

    fn put_ref(&self, reference: Ref) -> RefResult<bool> {
        validate_ref_name(reference.name())?;
        let mut refs = self.refs.write().expect("lock poisoned");
        if refs.get(reference.name()) == Some(&reference) {
            return Ok(false);
        }
        trace!(name = reference.name(), "updating ref");
        refs.insert(reference.name().to_string(), reference);
        Ok(true)
    }

    fn remove_ref(&self, name: &str) -> RefResult<Option<Ref>> {
        let mut refs = self.refs.write().expect("lock poisoned");
        if let Some(Ref::Symbolic { target, .. }) = refs.get(names::HEAD) {
            if target == name {
                return Err(RefError::DeleteCurrentBranch {
                    name: names::short_name(name).to_string(),
                });
            }
        }
        Ok(refs.remove(name))
    }

    fn list_refs(&self, prefix: &str) -> RefResult<Vec<Ref>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
