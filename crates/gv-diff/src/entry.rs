use std::fmt;

use gv_store::{NodeRef, NodeType};
use gv_types::{Envelope, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// Kind of change a diff entry or attribute diff describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn value(&self) -> u8 {
        match self {
            ChangeType::Added => 0,
            ChangeType::Modified => 1,
            ChangeType::Removed => 2,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChangeType::Added),
            1 => Some(ChangeType::Modified),
            2 => Some(ChangeType::Removed),
            _ => None,
        }
    }

    /// One-letter code used in diff and patch text: `A`, `M`, or `R`.
    pub fn code(&self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Modified => 'M',
            ChangeType::Removed => 'R',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(ChangeType::Added),
            "M" => Some(ChangeType::Modified),
            "R" => Some(ChangeType::Removed),
            _ => None,
        }
    }

    /// The change seen from the other side.
    pub fn reversed(&self) -> Self {
        match self {
            ChangeType::Added => ChangeType::Removed,
            ChangeType::Modified => ChangeType::Modified,
            ChangeType::Removed => ChangeType::Added,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "ADDED",
            ChangeType::Modified => "MODIFIED",
            ChangeType::Removed => "REMOVED",
        })
    }
}

/// One node-level difference between two trees.
///
/// At least one side is present; when both are, they share a node type and
/// differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiffEntry {
    old: Option<NodeRef>,
    new: Option<NodeRef>,
}

impl DiffEntry {
    pub fn new(old: Option<NodeRef>, new: Option<NodeRef>) -> DiffResult<Self> {
        match (&old, &new) {
            (None, None) => {
                return Err(DiffError::InvalidDiffEntry(
                    "either the old or the new node must be present".into(),
                ))
            }
            (Some(o), Some(n)) if o == n => {
                return Err(DiffError::InvalidDiffEntry(format!("{o} did not change")));
            }
            (Some(o), Some(n)) if o.node_type() != n.node_type() => {
                return Err(DiffError::InvalidDiffEntry(format!(
                    "node types differ: {} vs {}",
                    o.node_type(),
                    n.node_type()
                )));
            }
            _ => {}
        }
        Ok(Self { old, new })
    }

    pub fn added(node: NodeRef) -> Self {
        Self {
            old: None,
            new: Some(node),
        }
    }

    pub fn removed(node: NodeRef) -> Self {
        Self {
            old: Some(node),
            new: None,
        }
    }

    pub fn modified(old: NodeRef, new: NodeRef) -> DiffResult<Self> {
        Self::new(Some(old), Some(new))
    }

    pub fn change_type(&self) -> ChangeType {
        match (&self.old, &self.new) {
            (None, _) => ChangeType::Added,
            (_, None) => ChangeType::Removed,
            _ => ChangeType::Modified,
        }
    }

    pub fn old(&self) -> Option<&NodeRef> {
        self.old.as_ref()
    }

    pub fn new_node(&self) -> Option<&NodeRef> {
        self.new.as_ref()
    }

    /// Old object id, or NULL for an addition.
    pub fn old_object_id(&self) -> ObjectId {
        self.old.as_ref().map_or(ObjectId::NULL, |n| n.object_id())
    }

    /// New object id, or NULL for a removal.
    pub fn new_object_id(&self) -> ObjectId {
        self.new.as_ref().map_or(ObjectId::NULL, |n| n.object_id())
    }

    pub fn old_path(&self) -> Option<String> {
        self.old.as_ref().map(|n| n.path())
    }

    pub fn new_path(&self) -> Option<String> {
        self.new.as_ref().map(|n| n.path())
    }

    /// Path of the changed node; the new path unless the node was removed.
    pub fn path(&self) -> String {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|n| n.path())
            .unwrap_or_default()
    }

    pub fn node_type(&self) -> NodeType {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map_or(NodeType::Feature, |n| n.node_type())
    }

    pub fn is_tree(&self) -> bool {
        self.node_type() == NodeType::Tree
    }

    pub fn is_feature(&self) -> bool {
        self.node_type() == NodeType::Feature
    }

    /// The region affected by the change.
    pub fn bounds(&self) -> Option<Envelope> {
        let old = self.old.as_ref().and_then(|n| n.bounds());
        let new = self.new.as_ref().and_then(|n| n.bounds());
        Envelope::merge(old.copied(), new)
    }

    /// The same change seen from the other side.
    pub fn reversed(&self) -> Self {
        Self {
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |n: &Option<NodeRef>| n.as_ref().map(|n| n.to_string()).unwrap_or_default();
        write!(
            f,
            "{} [{}] -> [{}]",
            self.change_type(),
            side(&self.old),
            side(&self.new)
        )
    }
}
