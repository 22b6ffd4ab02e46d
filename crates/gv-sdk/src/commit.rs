use gv_store::{RevCommit, RevPerson};
use gv_types::ObjectId;

/// What to commit and how to describe it.
#[derive(Clone, Debug)]
pub struct CommitOptions {
    pub message: String,
    /// Root tree to commit. Defaults to the staging area.
    pub tree: Option<ObjectId>,
    /// Defaults to the identity in the repository config.
    pub author: Option<RevPerson>,
    /// Milliseconds since the Unix epoch. Defaults to now.
    pub timestamp: Option<i64>,
    pub allow_empty: bool,
    /// Stage every working tree change before committing.
    pub stage_all: bool,
}

impl CommitOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tree: None,
            author: None,
            timestamp: None,
            allow_empty: false,
            stage_all: false,
        }
    }

    pub fn with_tree(mut self, tree: ObjectId) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn with_author(mut self, name: &str, email: &str) -> Self {
        self.author = Some(RevPerson::new(Some(name), Some(email), 0, 0));
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Record the commit even when its tree equals the parent's.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn stage_all(mut self) -> Self {
        self.stage_all = true;
        self
    }
}

/// How [`Repository::merge`](crate::Repository::merge) moved `HEAD`.
#[derive(Clone, Debug)]
pub enum MergeStatus {
    /// Nothing to merge; `HEAD` stays at the given commit.
    UpToDate(ObjectId),
    /// `HEAD` moved forward to the given commit.
    FastForward(ObjectId),
    /// A merge commit with both heads as parents.
    Merged(RevCommit),
}

impl MergeStatus {
    /// The commit `HEAD` points at after the merge.
    pub fn head(&self) -> ObjectId {
        match self {
            MergeStatus::UpToDate(id) | MergeStatus::FastForward(id) => *id,
            MergeStatus::Merged(commit) => commit.id(),
        }
    }
}
