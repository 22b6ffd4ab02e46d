//! Commit graph abstraction.
//!
//! History walks only need parent links and commit times. [`StoreCommitGraph`]
//! reads them from commits in an object database; [`AncestryGraph`] keeps
//! them in memory, detached from commit payloads.

use std::collections::HashMap;
use std::sync::RwLock;

use gv_store::{ObjectDatabase, RevCommit};
use gv_types::ObjectId;
use tracing::debug;

use crate::error::{DagError, DagResult};

/// Read access to the parent links of a commit history.
pub trait CommitGraph: Send + Sync {
    fn contains(&self, id: &ObjectId) -> DagResult<bool>;

    /// Parent ids, first parent first. Fails if `id` is unknown.
    fn parents(&self, id: &ObjectId) -> DagResult<Vec<ObjectId>>;

    /// Commit time in milliseconds since the epoch, used to order walks.
    fn timestamp(&self, id: &ObjectId) -> DagResult<i64>;
}

/// Commit graph backed by the commits of an object database.
pub struct StoreCommitGraph<'a> {
    db: &'a dyn ObjectDatabase,
}

impl<'a> StoreCommitGraph<'a> {
    pub fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self { db }
    }

    fn commit(&self, id: &ObjectId) -> DagResult<RevCommit> {
        match self.db.get_if_present(id)? {
            Some(object) => object
                .as_commit()
                .cloned()
                .ok_or(DagError::NotFound(*id)),
            None => Err(DagError::NotFound(*id)),
        }
    }
}

impl CommitGraph for StoreCommitGraph<'_> {
    fn contains(&self, id: &ObjectId) -> DagResult<bool> {
        Ok(self
            .db
            .get_if_present(id)?
            .is_some_and(|o| o.as_commit().is_some()))
    }

    fn parents(&self, id: &ObjectId) -> DagResult<Vec<ObjectId>> {
        Ok(self.commit(id)?.parent_ids().to_vec())
    }

    fn timestamp(&self, id: &ObjectId) -> DagResult<i64> {
        Ok(self.commit(id)?.timestamp())
    }
}

#[derive(Clone, Debug)]
struct GraphNode {
    parents: Vec<ObjectId>,
    timestamp: i64,
}

/// In-memory commit graph.
///
/// Parents must be recorded before their children, so the graph is always
/// closed under parent links.
#[derive(Default)]
pub struct AncestryGraph {
    nodes: RwLock<HashMap<ObjectId, GraphNode>>,
    children: RwLock<HashMap<ObjectId, Vec<ObjectId>>>,
}

impl AncestryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit. Returns `false` if it was already recorded with the
    /// same parents.
    pub fn put(&self, id: ObjectId, parents: Vec<ObjectId>, timestamp: i64) -> DagResult<bool> {
        let mut nodes = self.nodes.write().expect("lock poisoned");
        if let Some(existing) = nodes.get(&id) {
            if existing.parents == parents {
                return Ok(false);
            }
            return Err(DagError::ConflictingParents(id));
        }
        if let Some(parent) = parents.iter().find(|p| !nodes.contains_key(p)) {
            return Err(DagError::DanglingParent {
                node: id,
                parent: *parent,
            });
        }
        let mut children = self.children.write().expect("lock poisoned");
        for parent in &parents {
            children.entry(*parent).or_default().push(id);
        }
        debug!(commit = %id.short_hex(), parents = parents.len(), "recorded commit");
        nodes.insert(id, GraphNode { parents, timestamp });
        Ok(true)
    }

    pub fn put_commit(&self, commit: &RevCommit) -> DagResult<bool> {
        self.put(commit.id(), commit.parent_ids().to_vec(), commit.timestamp())
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: &ObjectId) -> Vec<ObjectId> {
        self.children
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: &ObjectId) -> DagResult<GraphNode> {
        self.nodes
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or(DagError::NotFound(*id))
    }
}

impl CommitGraph for AncestryGraph {
    fn contains(&self, id: &ObjectId) -> DagResult<bool> {
        Ok(self.nodes.read().expect("lock poisoned").contains_key(id))
    }

    fn parents(&self, id: &ObjectId) -> DagResult<Vec<ObjectId>> {
        Ok(self.node(id)?.parents)
    }

    fn timestamp(&self, id: &ObjectId) -> DagResult<i64> {
        Ok(self.node(id)?.timestamp)
    }
}
