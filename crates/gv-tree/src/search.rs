use gv_store::storage_order::{self, MAX_DEPTH};
use gv_store::{Node, NodeRef, ObjectDatabase, RevTree};
use gv_types::path;
use gv_types::ObjectId;

use crate::error::TreeResult;

/// Resolves paths and names against stored trees, following buckets.
pub struct DepthSearch<'a> {
    db: &'a dyn ObjectDatabase,
}

impl<'a> DepthSearch<'a> {
    pub fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self { db }
    }

    /// Resolve `path` below the tree with id `root_id`.
    pub fn find_from_id(&self, root_id: &ObjectId, path: &str) -> TreeResult<Option<NodeRef>> {
        let root = self.db.get_tree(root_id)?;
        self.find(&root, path)
    }

    /// Resolve `path` below `root`.
    ///
    /// The empty path resolves to the root itself. Returns `None` if any
    /// segment is missing or an intermediate segment is a feature.
    pub fn find(&self, root: &RevTree, path: &str) -> TreeResult<Option<NodeRef>> {
        if path.is_empty() {
            return Ok(Some(NodeRef::root(root.id())));
        }
        let segments = path::split(path);
        let mut tree = root.clone();
        let mut parent_path = String::new();
        let mut metadata_id = ObjectId::NULL;
        for (i, segment) in segments.iter().enumerate() {
            let Some(node) = self.find_child(&tree, segment)? else {
                return Ok(None);
            };
            let node_ref = NodeRef::new(node, parent_path.clone(), metadata_id);
            if i == segments.len() - 1 {
                return Ok(Some(node_ref));
            }
            if !node_ref.is_tree() {
                return Ok(None);
            }
            tree = self.db.get_tree(&node_ref.object_id())?;
            metadata_id = node_ref.metadata_id();
            parent_path = node_ref.path();
        }
        Ok(None)
    }

    /// Direct child `name` of `tree`, a root-level tree.
    pub fn find_child(&self, tree: &RevTree, name: &str) -> TreeResult<Option<Node>> {
        self.find_child_at(tree, name, 0)
    }

    /// Direct child `name` of `tree`, a tree at bucket depth `depth`.
    pub fn find_child_at(
        &self,
        tree: &RevTree,
        name: &str,
        depth: usize,
    ) -> TreeResult<Option<Node>> {
        if !tree.has_buckets() {
            let found = tree
                .children()
                .binary_search_by(|n| storage_order::compare_names(n.name(), name))
                .ok()
                .map(|i| tree.children()[i].clone());
            return Ok(found);
        }
        if depth >= MAX_DEPTH {
            return Ok(None);
        }
        let index = storage_order::bucket(name, depth);
        match tree.buckets().get(&index) {
            Some(bucket) => {
                let subtree = self.db.get_tree(&bucket.id)?;
                self.find_child_at(&subtree, name, depth + 1)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RevTreeBuilder;
    use gv_store::{InMemoryObjectDatabase, RevObject};

    fn feature(name: &str) -> Node {
        Node::feature(name, ObjectId::for_string(name), ObjectId::NULL)
    }

    fn store(db: &InMemoryObjectDatabase, tree: &RevTree) {
        db.put(&RevObject::Tree(tree.clone())).unwrap();
    }

    #[test]
    fn finds_nested_paths_with_inherited_metadata() {
        let db = InMemoryObjectDatabase::new();
        let meta = ObjectId::for_string("roadtype");
        let mut roads = RevTreeBuilder::new(&db);
        roads.put(feature("r1")).unwrap();
        let roads = roads.build().unwrap();
        store(&db, &roads);

        let mut root = RevTreeBuilder::new(&db);
        root.put(Node::tree("roads", roads.id(), meta).unwrap()).unwrap();
        let root = root.build().unwrap();
        store(&db, &root);

        let search = DepthSearch::new(&db);
        let r1 = search.find(&root, "roads/r1").unwrap().unwrap();
        assert_eq!(r1.path(), "roads/r1");
        assert_eq!(r1.metadata_id(), meta);

        let roads_ref = search.find_from_id(&root.id(), "roads").unwrap().unwrap();
        assert!(roads_ref.is_tree());
        assert!(search.find(&root, "roads/missing").unwrap().is_none());
        assert!(search.find(&root, "roads/r1/deeper").unwrap().is_none());
        assert_eq!(search.find(&root, "").unwrap().unwrap().object_id(), root.id());
    }

    #[test]
    fn finds_children_inside_buckets() {
        let db = InMemoryObjectDatabase::new();
        let mut b = RevTreeBuilder::new(&db);
        for i in 0..700 {
            b.put(feature(&format!("f{i}"))).unwrap();
        }
        let tree = b.build().unwrap();
        assert!(tree.has_buckets());
        let search = DepthSearch::new(&db);
        for i in [0, 123, 699] {
            let name = format!("f{i}");
            let found = search.find_child(&tree, &name).unwrap().unwrap();
            assert_eq!(found.object_id(), ObjectId::for_string(&name));
        }
        assert!(search.find_child(&tree, "f700").unwrap().is_none());
    }
}
