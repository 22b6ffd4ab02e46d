use std::fmt;

use gv_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::hash;

/// Author, committer, or tagger identity with a timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevPerson {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Time zone offset in milliseconds.
    pub tz_offset: i32,
}

impl RevPerson {
    pub fn new(name: Option<&str>, email: Option<&str>, timestamp: i64, tz_offset: i32) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            timestamp,
            tz_offset,
        }
    }

    /// Same identity, stamped with `timestamp`.
    pub fn at(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

impl fmt::Display for RevPerson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.email) {
            (Some(n), Some(e)) => write!(f, "{n} <{e}>"),
            (Some(n), None) => f.write_str(n),
            (None, Some(e)) => write!(f, "<{e}>"),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

/// An immutable commit.
///
/// Created through [`CommitBuilder`]; the id is derived from every other
/// field and never supplied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevCommit {
    #[serde(skip)]
    id: ObjectId,
    tree_id: ObjectId,
    parent_ids: Vec<ObjectId>,
    author: RevPerson,
    committer: RevPerson,
    message: String,
}

impl RevCommit {
    /// Assemble a commit from explicit fields. Prefer [`CommitBuilder`],
    /// which fills in defaults.
    pub fn new(
        tree_id: ObjectId,
        parent_ids: Vec<ObjectId>,
        author: RevPerson,
        committer: RevPerson,
        message: impl Into<String>,
    ) -> Self {
        let commit = Self {
            id: ObjectId::NULL,
            tree_id,
            parent_ids,
            author,
            committer,
            message: message.into(),
        };
        commit.rehash()
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn tree_id(&self) -> ObjectId {
        self.tree_id
    }

    /// Parents in order; the first one is the first parent.
    pub fn parent_ids(&self) -> &[ObjectId] {
        &self.parent_ids
    }

    pub fn parent_n(&self, n: usize) -> Option<ObjectId> {
        self.parent_ids.get(n).copied()
    }

    pub fn author(&self) -> &RevPerson {
        &self.author
    }

    pub fn committer(&self) -> &RevPerson {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Commit time: the committer timestamp.
    pub fn timestamp(&self) -> i64 {
        self.committer.timestamp
    }

    pub(crate) fn rehash(mut self) -> Self {
        self.id = hash::commit_id(&self);
        self
    }
}

impl PartialEq for RevCommit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RevCommit {}

/// Builder for [`RevCommit`].
///
/// The committer defaults to the author. Zero timestamps default to the
/// current time.
#[derive(Clone, Debug, Default)]
pub struct CommitBuilder {
    tree_id: Option<ObjectId>,
    parent_ids: Vec<ObjectId>,
    author: RevPerson,
    committer: Option<RevPerson>,
    message: String,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing commit's fields.
    pub fn from_commit(commit: &RevCommit) -> Self {
        Self {
            tree_id: Some(commit.tree_id),
            parent_ids: commit.parent_ids.clone(),
            author: commit.author.clone(),
            committer: Some(commit.committer.clone()),
            message: commit.message.clone(),
        }
    }

    pub fn tree_id(mut self, tree_id: ObjectId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    pub fn parent_ids(mut self, parent_ids: Vec<ObjectId>) -> Self {
        self.parent_ids = parent_ids;
        self
    }

    pub fn parent(mut self, parent_id: ObjectId) -> Self {
        self.parent_ids.push(parent_id);
        self
    }

    pub fn author(mut self, author: RevPerson) -> Self {
        self.author = author;
        self
    }

    pub fn committer(mut self, committer: RevPerson) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn build(self) -> StoreResult<RevCommit> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StoreError::InvalidCommit("tree id not set".into()))?;
        let now = chrono::Utc::now().timestamp_millis();
        let mut author = self.author;
        if author.timestamp == 0 {
            author.timestamp = now;
        }
        let mut committer = self.committer.unwrap_or_else(|| author.clone());
        if committer.timestamp == 0 {
            committer.timestamp = now;
        }
        Ok(RevCommit::new(
            tree_id,
            self.parent_ids,
            author,
            committer,
            self.message,
        ))
    }
}
