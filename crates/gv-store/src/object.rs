use std::fmt;

use gv_types::{ObjectId, ObjectType};
use serde::{Deserialize, Serialize};

use crate::commit::{RevCommit, RevPerson};
use crate::feature::{RevFeature, RevFeatureType};
use crate::hash;
use crate::tree::RevTree;

// ---------------------------------------------------------------------------
// RevTag
// ---------------------------------------------------------------------------

/// A named, annotated pointer to a commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevTag {
    #[serde(skip)]
    id: ObjectId,
    name: String,
    commit_id: ObjectId,
    message: String,
    tagger: RevPerson,
}

impl RevTag {
    pub fn new(
        name: impl Into<String>,
        commit_id: ObjectId,
        message: impl Into<String>,
        tagger: RevPerson,
    ) -> Self {
        let tag = Self {
            id: ObjectId::NULL,
            name: name.into(),
            commit_id,
            message: message.into(),
            tagger,
        };
        tag.rehash()
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit_id(&self) -> ObjectId {
        self.commit_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tagger(&self) -> &RevPerson {
        &self.tagger
    }

    pub(crate) fn rehash(mut self) -> Self {
        self.id = hash::tag_id(&self);
        self
    }
}

impl PartialEq for RevTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RevTag {}

// ---------------------------------------------------------------------------
// RevObject
// ---------------------------------------------------------------------------

/// Any revision object. Equality is by id.
#[derive(Clone, Debug)]
pub enum RevObject {
    Commit(RevCommit),
    Tree(RevTree),
    Feature(RevFeature),
    FeatureType(RevFeatureType),
    Tag(RevTag),
}

impl RevObject {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Commit(c) => c.id(),
            Self::Tree(t) => t.id(),
            Self::Feature(f) => f.id(),
            Self::FeatureType(ft) => ft.id(),
            Self::Tag(t) => t.id(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Commit(_) => ObjectType::Commit,
            Self::Tree(_) => ObjectType::Tree,
            Self::Feature(_) => ObjectType::Feature,
            Self::FeatureType(_) => ObjectType::FeatureType,
            Self::Tag(_) => ObjectType::Tag,
        }
    }

    /// Recompute the id from the object's content.
    ///
    /// Decoders skip the id on the wire and call this to restore it.
    pub fn rehash(self) -> Self {
        match self {
            Self::Commit(c) => Self::Commit(c.rehash()),
            Self::Tree(t) => Self::Tree(t.rehash()),
            Self::Feature(f) => Self::Feature(f.rehash()),
            Self::FeatureType(ft) => Self::FeatureType(ft.rehash()),
            Self::Tag(t) => Self::Tag(t.rehash()),
        }
    }

    pub fn as_tree(&self) -> Option<&RevTree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&RevCommit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_feature(&self) -> Option<&RevFeature> {
        match self {
            Self::Feature(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_feature_type(&self) -> Option<&RevFeatureType> {
        match self {
            Self::FeatureType(ft) => Some(ft),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&RevTag> {
        match self {
            Self::Tag(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for RevObject {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for RevObject {}

impl fmt::Display for RevObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.object_type(), self.id())
    }
}

impl From<RevCommit> for RevObject {
    fn from(c: RevCommit) -> Self {
        Self::Commit(c)
    }
}

impl From<RevTree> for RevObject {
    fn from(t: RevTree) -> Self {
        Self::Tree(t)
    }
}

impl From<RevFeature> for RevObject {
    fn from(f: RevFeature) -> Self {
        Self::Feature(f)
    }
}

impl From<RevFeatureType> for RevObject {
    fn from(ft: RevFeatureType) -> Self {
        Self::FeatureType(ft)
    }
}

impl From<RevTag> for RevObject {
    fn from(t: RevTag) -> Self {
        Self::Tag(t)
    }
}
