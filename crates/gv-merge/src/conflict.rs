use std::fmt;

use gv_diff::DiffEntry;
use gv_types::ObjectId;
use serde::{Deserialize, Serialize};

/// A path changed on both sides in incompatible ways.
///
/// The ids are those of the node at `path` in the common ancestor, ours, and
/// theirs; NULL where the node is absent. For trees whose metadata differs,
/// they are metadata ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub ancestor: ObjectId,
    pub ours: ObjectId,
    pub theirs: ObjectId,
}

impl Conflict {
    pub fn new(path: impl Into<String>, ancestor: ObjectId, ours: ObjectId, theirs: ObjectId) -> Self {
        Self {
            path: path.into(),
            ancestor,
            ours,
            theirs,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.path, self.ancestor, self.ours, self.theirs)
    }
}

/// Outcome of comparing both sides of a merge against their ancestor.
///
/// `unconflicted` holds the changes of "theirs" that can be carried over to
/// "ours", in diff order.
#[derive(Clone, Debug, Default)]
pub struct ConflictsReport {
    pub conflicts: Vec<Conflict>,
    pub unconflicted: Vec<DiffEntry>,
}

impl ConflictsReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.unconflicted.is_empty()
    }

    pub fn conflict(&self, path: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_round_trip_through_json() {
        let c = Conflict::new(
            "roads/r1",
            ObjectId::NULL,
            ObjectId::for_string("ours"),
            ObjectId::for_string("theirs"),
        );
        let json = serde_json::to_string(&c).unwrap();
        let back: Conflict = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(c.to_string().starts_with("roads/r1\t"));
    }
}
