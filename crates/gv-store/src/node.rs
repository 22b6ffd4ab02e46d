use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use gv_types::path::{self, PATH_SEPARATOR};
use gv_types::{Envelope, ObjectId, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Kind of object a [`Node`] points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Feature,
    Tree,
}

impl NodeType {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Feature => ObjectType::Feature,
            Self::Tree => ObjectType::Tree,
        }
    }

    pub fn from_object_type(t: ObjectType) -> Option<Self> {
        match t {
            ObjectType::Feature => Some(Self::Feature),
            ObjectType::Tree => Some(Self::Tree),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type().name())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A named, typed pointer from a tree to a child feature or subtree.
///
/// A node whose object id is [`ObjectId::NULL`] is a tombstone: tree builders
/// use it to record a pending removal.
///
/// Equality and hashing consider name, type, metadata id, and object id.
/// Bounds are informational and do not participate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    name: String,
    object_id: ObjectId,
    metadata_id: Option<ObjectId>,
    node_type: NodeType,
    bounds: Option<Envelope>,
}

impl Node {
    /// Create a node, validating that tree names hold a single path segment.
    ///
    /// A NULL `metadata_id` is stored as absent.
    pub fn create(
        name: impl Into<String>,
        object_id: ObjectId,
        metadata_id: ObjectId,
        node_type: NodeType,
        bounds: Option<Envelope>,
    ) -> StoreResult<Self> {
        let name = name.into();
        if node_type == NodeType::Tree && name.contains(PATH_SEPARATOR) {
            return Err(StoreError::InvalidNode(format!(
                "tree node name '{name}' contains '{PATH_SEPARATOR}'"
            )));
        }
        Ok(Self {
            name,
            object_id,
            metadata_id: (!metadata_id.is_null()).then_some(metadata_id),
            node_type,
            bounds,
        })
    }

    /// A feature node without bounds.
    pub fn feature(name: impl Into<String>, object_id: ObjectId, metadata_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            object_id,
            metadata_id: (!metadata_id.is_null()).then_some(metadata_id),
            node_type: NodeType::Feature,
            bounds: None,
        }
    }

    /// A tree node without bounds.
    pub fn tree(
        name: impl Into<String>,
        object_id: ObjectId,
        metadata_id: ObjectId,
    ) -> StoreResult<Self> {
        Self::create(name, object_id, metadata_id, NodeType::Tree, None)
    }

    /// A tombstone recording the removal of `name`.
    pub fn tombstone(name: impl Into<String>) -> Self {
        Self::feature(name, ObjectId::NULL, ObjectId::NULL)
    }

    pub fn with_bounds(mut self, bounds: Option<Envelope>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Same name, type, and metadata, pointing at a new object.
    pub fn update(&self, object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self {
            name: self.name.clone(),
            object_id,
            metadata_id: self.metadata_id,
            node_type: self.node_type,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn metadata_id(&self) -> Option<ObjectId> {
        self.metadata_id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }

    pub fn is_tree(&self) -> bool {
        self.node_type == NodeType::Tree
    }

    pub fn is_feature(&self) -> bool {
        self.node_type == NodeType::Feature
    }

    /// Returns `true` if this node records a pending removal.
    pub fn is_tombstone(&self) -> bool {
        self.object_id.is_null()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.node_type == other.node_type
            && self.metadata_id == other.metadata_id
            && self.object_id == other.object_id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.node_type.hash(state);
        self.metadata_id.hash(state);
        self.object_id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{} -> {}]", self.node_type, self.name, self.object_id.short_hex())
    }
}

// ---------------------------------------------------------------------------
// NodeRef
// ---------------------------------------------------------------------------

/// A [`Node`] resolved at a full path.
///
/// The effective metadata id is the node's own, or the default inherited
/// from the parent tree when the node carries none. NodeRefs order by path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    node: Node,
    parent_path: String,
    metadata_id: ObjectId,
}

impl NodeRef {
    pub fn new(node: Node, parent_path: impl Into<String>, default_metadata_id: ObjectId) -> Self {
        let metadata_id = node.metadata_id().unwrap_or(default_metadata_id);
        Self {
            node,
            parent_path: parent_path.into(),
            metadata_id,
        }
    }

    /// Reference to a root tree, at the empty path.
    pub fn root(tree_id: ObjectId) -> Self {
        Self::new(
            Node {
                name: String::new(),
                object_id: tree_id,
                metadata_id: None,
                node_type: NodeType::Tree,
                bounds: None,
            },
            "",
            ObjectId::NULL,
        )
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    /// Full path: parent path joined with the node name.
    pub fn path(&self) -> String {
        path::append_child(&self.parent_path, self.node.name())
    }

    pub fn object_id(&self) -> ObjectId {
        self.node.object_id()
    }

    /// Effective metadata id; NULL when neither node nor parent defines one.
    pub fn metadata_id(&self) -> ObjectId {
        self.metadata_id
    }

    pub fn node_type(&self) -> NodeType {
        self.node.node_type()
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.node.bounds()
    }

    pub fn is_tree(&self) -> bool {
        self.node.is_tree()
    }

    pub fn is_feature(&self) -> bool {
        self.node.is_feature()
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path()
            .cmp(&other.path())
            .then_with(|| self.node_type().cmp(&other.node_type()))
            .then_with(|| self.object_id().cmp(&other.object_id()))
            .then_with(|| self.metadata_id.cmp(&other.metadata_id))
            .then_with(|| self.node.metadata_id.cmp(&other.node.metadata_id))
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{} -> {}]",
            self.node_type(),
            self.path(),
            self.object_id().short_hex()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> ObjectId {
        ObjectId::for_string(s)
    }

    #[test]
    fn tree_names_must_be_single_segment() {
        assert!(Node::tree("roads", oid("t"), ObjectId::NULL).is_ok());
        assert!(matches!(
            Node::tree("a/b", oid("t"), ObjectId::NULL),
            Err(StoreError::InvalidNode(_))
        ));
        // Feature names are not restricted.
        assert!(Node::create("a/b", oid("f"), ObjectId::NULL, NodeType::Feature, None).is_ok());
    }

    #[test]
    fn null_metadata_is_absent() {
        let n = Node::feature("f", oid("f"), ObjectId::NULL);
        assert_eq!(n.metadata_id(), None);
        let n = Node::feature("f", oid("f"), oid("ft"));
        assert_eq!(n.metadata_id(), Some(oid("ft")));
    }

    #[test]
    fn equality_ignores_bounds() {
        let a = Node::feature("f", oid("f"), ObjectId::NULL);
        let b = a.clone().with_bounds(Some(Envelope::of_point(1.0, 1.0)));
        assert_eq!(a, b);
        let c = Node::feature("f", oid("g"), ObjectId::NULL);
        assert_ne!(a, c);
    }

    #[test]
    fn equality_considers_type_and_metadata() {
        let f = Node::feature("x", oid("x"), ObjectId::NULL);
        let t = Node::tree("x", oid("x"), ObjectId::NULL).unwrap();
        assert_ne!(f, t);
        let f2 = Node::feature("x", oid("x"), oid("meta"));
        assert_ne!(f, f2);
    }

    #[test]
    fn tombstones_have_null_ids() {
        let t = Node::tombstone("gone");
        assert!(t.is_tombstone());
        assert!(!Node::feature("f", oid("f"), ObjectId::NULL).is_tombstone());
    }

    #[test]
    fn node_ref_path_and_metadata_inheritance() {
        let node = Node::feature("f1", oid("f1"), ObjectId::NULL);
        let r = NodeRef::new(node, "roads", oid("roadtype"));
        assert_eq!(r.path(), "roads/f1");
        assert_eq!(r.metadata_id(), oid("roadtype"));

        let own = Node::feature("f2", oid("f2"), oid("own"));
        let r = NodeRef::new(own, "roads", oid("roadtype"));
        assert_eq!(r.metadata_id(), oid("own"));
    }

    #[test]
    fn node_refs_order_by_path() {
        let a = NodeRef::new(Node::feature("b", oid("1"), ObjectId::NULL), "a", ObjectId::NULL);
        let b = NodeRef::new(Node::feature("a", oid("2"), ObjectId::NULL), "b", ObjectId::NULL);
        let top = NodeRef::new(Node::feature("a", oid("3"), ObjectId::NULL), "", ObjectId::NULL);
        let mut refs = vec![b.clone(), a.clone(), top.clone()];
        refs.sort();
        assert_eq!(refs, vec![top, a, b]);
    }

    #[test]
    fn root_ref_has_empty_path() {
        let r = NodeRef::root(oid("root"));
        assert_eq!(r.path(), "");
        assert!(r.is_tree());
    }
}
