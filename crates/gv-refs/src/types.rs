//! Core reference types.
//!
//! A ref either points directly at an object (usually a commit, or a root
//! tree for `WORK_HEAD` and `STAGE_HEAD`) or names another ref.

use gv_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::names;

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ref {
    /// Points at an object by id.
    Direct { name: String, object_id: ObjectId },

    /// Points at another ref by name, e.g. `HEAD` -> `refs/heads/master`.
    Symbolic { name: String, target: String },
}

impl Ref {
    pub fn direct(name: impl Into<String>, object_id: ObjectId) -> Self {
        Ref::Direct {
            name: name.into(),
            object_id,
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Ref::Symbolic {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Full name, e.g. `refs/heads/master`.
    pub fn name(&self) -> &str {
        match self {
            Ref::Direct { name, .. } | Ref::Symbolic { name, .. } => name,
        }
    }

    /// Name without the `refs/...` prefix.
    pub fn short_name(&self) -> &str {
        names::short_name(self.name())
    }

    /// The object id of a direct ref.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Ref::Direct { object_id, .. } => Some(*object_id),
            Ref::Symbolic { .. } => None,
        }
    }

    /// The ref named by a symbolic ref.
    pub fn target(&self) -> Option<&str> {
        match self {
            Ref::Symbolic { target, .. } => Some(target),
            Ref::Direct { .. } => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic { .. })
    }

    pub fn is_branch(&self) -> bool {
        self.name().starts_with(names::HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.name().starts_with(names::TAGS_PREFIX)
    }
}
