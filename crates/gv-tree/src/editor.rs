//! Multi-level edits against a root tree.
//!
//! [`TreeEditor`] collects feature and tree edits addressed by full path and
//! writes them bottom-up: every touched tree is rebuilt with a
//! [`RevTreeBuilder`], stored, and re-linked into its parent until a new root
//! comes out.

use std::collections::{BTreeMap, BTreeSet};

use gv_store::{Node, ObjectDatabase, RevObject, RevTree};
use gv_types::path;
use gv_types::{Envelope, ObjectId, ProgressListener};
use tracing::debug;

use crate::builder::RevTreeBuilder;
use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::search::DepthSearch;

#[derive(Clone, Debug)]
enum Edit {
    Put(Node),
    Remove(String),
}

/// Buffered path edits over a root tree.
pub struct TreeEditor<'a> {
    db: &'a dyn ObjectDatabase,
    config: TreeConfig,
    root: RevTree,
    edits: BTreeMap<String, Vec<Edit>>,
    tree_metadata: BTreeMap<String, ObjectId>,
    cleared: BTreeSet<String>,
    listener: Option<&'a dyn ProgressListener>,
}

impl<'a> TreeEditor<'a> {
    pub fn new(db: &'a dyn ObjectDatabase, root: RevTree) -> Self {
        Self {
            db,
            config: TreeConfig::default(),
            root,
            edits: BTreeMap::new(),
            tree_metadata: BTreeMap::new(),
            cleared: BTreeSet::new(),
            listener: None,
        }
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    /// Report progress to and honour cancellation from `listener`.
    pub fn with_listener(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Insert or replace the feature at `path`. Missing ancestor trees are
    /// created.
    pub fn put_feature(
        &mut self,
        feature_path: &str,
        feature_id: ObjectId,
        metadata_id: ObjectId,
        bounds: Option<Envelope>,
    ) -> TreeResult<()> {
        let (parent, name) = split_path(feature_path)?;
        let node = Node::feature(name, feature_id, metadata_id).with_bounds(bounds);
        self.push(parent, Edit::Put(node));
        Ok(())
    }

    /// Insert or replace `node` as a direct child of `parent_path`.
    pub fn put_node(&mut self, parent_path: &str, node: Node) -> TreeResult<()> {
        if !path::is_valid(parent_path) {
            return Err(TreeError::InvalidPath(parent_path.to_string()));
        }
        self.push(parent_path, Edit::Put(node));
        Ok(())
    }

    /// Create the tree at `path`, or update its metadata id if it exists.
    pub fn put_tree(&mut self, tree_path: &str, metadata_id: ObjectId) -> TreeResult<()> {
        split_path(tree_path)?;
        self.tree_metadata.insert(tree_path.to_string(), metadata_id);
        self.edits.entry(tree_path.to_string()).or_default();
        Ok(())
    }

    /// Remove the node at `path`, and drop any pending edits below it.
    pub fn remove(&mut self, node_path: &str) -> TreeResult<()> {
        let (parent, name) = split_path(node_path)?;
        let below = |p: &String| p == node_path || path::is_child(node_path, p);
        self.edits.retain(|p, _| !below(p));
        self.tree_metadata.retain(|p, _| !below(p));
        self.cleared.insert(node_path.to_string());
        self.push(parent, Edit::Remove(name.to_string()));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    fn push(&mut self, parent: &str, edit: Edit) {
        self.edits.entry(parent.to_string()).or_default().push(edit);
    }

    /// Write every touched tree and return the new root, which is stored
    /// along with its subtrees.
    pub fn write(mut self) -> TreeResult<RevTree> {
        let mut touched: BTreeSet<String> = BTreeSet::new();
        for p in self.edits.keys().chain(self.tree_metadata.keys()) {
            touched.extend(path::all_paths_to(p));
        }
        let mut ordered: Vec<String> = touched.into_iter().collect();
        ordered.sort_by(|a, b| path::depth(b).cmp(&path::depth(a)).then_with(|| a.cmp(b)));

        if let Some(listener) = self.listener {
            listener.started();
        }
        let total = ordered.len() + 1;
        for (done, tree_path) in ordered.iter().enumerate() {
            self.check_canceled()?;
            self.write_subtree(tree_path)?;
            if let Some(listener) = self.listener {
                listener.set_progress(100.0 * (done + 1) as f32 / total as f32);
            }
        }
        self.check_canceled()?;

        let edits = self.edits.remove("").unwrap_or_default();
        let root = self.apply(&self.root, edits)?;
        self.db.put(&RevObject::Tree(root.clone()))?;
        debug!(root = %root.id().short_hex(), trees = ordered.len(), "wrote tree edits");
        if let Some(listener) = self.listener {
            listener.complete();
        }
        Ok(root)
    }

    fn check_canceled(&self) -> TreeResult<()> {
        match self.listener {
            Some(listener) if listener.is_canceled() => Err(TreeError::Canceled),
            _ => Ok(()),
        }
    }

    fn write_subtree(&mut self, tree_path: &str) -> TreeResult<()> {
        let existing = if self.is_cleared(tree_path) {
            None
        } else {
            DepthSearch::new(self.db).find(&self.root, tree_path)?
        };
        if let Some(node) = &existing {
            if !node.is_tree() {
                return Err(TreeError::NotATree(tree_path.to_string()));
            }
        }
        let current = match &existing {
            Some(node) => self.db.get_tree(&node.object_id())?,
            None => RevTree::empty().clone(),
        };

        let edits = self.edits.remove(tree_path).unwrap_or_default();
        let tree = self.apply(&current, edits)?;
        let explicit_metadata = self.tree_metadata.get(tree_path).copied();
        if existing.is_none() && explicit_metadata.is_none() && tree.is_empty() {
            return Ok(());
        }
        let metadata_id = explicit_metadata
            .or_else(|| existing.as_ref().and_then(|n| n.node().metadata_id()))
            .unwrap_or(ObjectId::NULL);

        let node = Node::tree(path::node_name(tree_path), tree.id(), metadata_id)?
            .with_bounds(tree.bounds());
        self.db.put(&RevObject::Tree(tree))?;
        self.push(path::parent_path(tree_path), Edit::Put(node));
        Ok(())
    }

    fn is_cleared(&self, tree_path: &str) -> bool {
        path::all_paths_to(tree_path)
            .iter()
            .any(|p| self.cleared.contains(p))
    }

    fn apply(&self, base: &RevTree, edits: Vec<Edit>) -> TreeResult<RevTree> {
        let mut builder = RevTreeBuilder::at_depth(self.db, base, 0, self.config.clone());
        for edit in edits {
            match edit {
                Edit::Put(node) => builder.put(node)?,
                Edit::Remove(name) => builder.remove(&name)?,
            }
        }
        builder.build()
    }
}

fn split_path(full_path: &str) -> TreeResult<(&str, &str)> {
    if full_path.is_empty() || !path::is_valid(full_path) {
        return Err(TreeError::InvalidPath(full_path.to_string()));
    }
    Ok((path::parent_path(full_path), path::node_name(full_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::{DepthTreeIterator, Strategy};
    use gv_store::InMemoryObjectDatabase;
    use gv_types::DefaultProgressListener;

    fn fid(s: &str) -> ObjectId {
        ObjectId::for_string(s)
    }

    fn features(db: &InMemoryObjectDatabase, root: &RevTree) -> Vec<(String, ObjectId)> {
        let mut out: Vec<_> = DepthTreeIterator::new(db, root, Strategy::RecursiveFeaturesOnly)
            .map(|r| r.unwrap())
            .map(|n| (n.path(), n.object_id()))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn creates_intermediate_trees() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_feature("roads/main/r1", fid("r1"), ObjectId::NULL, None).unwrap();
        editor.put_feature("roads/r2", fid("r2"), ObjectId::NULL, None).unwrap();
        editor.put_feature("top", fid("top"), ObjectId::NULL, None).unwrap();
        let root = editor.write().unwrap();

        assert_eq!(
            features(&db, &root),
            vec![
                ("roads/main/r1".to_string(), fid("r1")),
                ("roads/r2".to_string(), fid("r2")),
                ("top".to_string(), fid("top")),
            ]
        );
        assert_eq!(root.size(), 3);
        assert_eq!(root.num_trees(), 2);
        assert!(db.exists(&root.id()).unwrap());
    }

    #[test]
    fn edits_leave_untouched_subtrees_alone() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_feature("a/x", fid("x"), ObjectId::NULL, None).unwrap();
        editor.put_feature("b/y", fid("y"), ObjectId::NULL, None).unwrap();
        let first = editor.write().unwrap();
        let search = DepthSearch::new(&db);
        let b_before = search.find(&first, "b").unwrap().unwrap().object_id();

        let mut editor = TreeEditor::new(&db, first);
        editor.put_feature("a/z", fid("z"), ObjectId::NULL, None).unwrap();
        editor.remove("a/x").unwrap();
        let second = editor.write().unwrap();
        assert_eq!(search.find(&second, "b").unwrap().unwrap().object_id(), b_before);
        assert_eq!(
            features(&db, &second),
            vec![("a/z".to_string(), fid("z")), ("b/y".to_string(), fid("y"))]
        );
    }

    #[test]
    fn tree_metadata_is_set_and_inherited() {
        let db = InMemoryObjectDatabase::new();
        let meta = fid("type");
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_tree("layer", meta).unwrap();
        editor.put_feature("layer/f", fid("f"), ObjectId::NULL, None).unwrap();
        let root = editor.write().unwrap();
        let f = DepthSearch::new(&db).find(&root, "layer/f").unwrap().unwrap();
        assert_eq!(f.metadata_id(), meta);

        let mut editor = TreeEditor::new(&db, root);
        editor.put_tree("empty", fid("other")).unwrap();
        let root = editor.write().unwrap();
        let empty = DepthSearch::new(&db).find(&root, "empty").unwrap().unwrap();
        assert!(empty.is_tree());
        assert_eq!(empty.object_id(), RevTree::empty_id());
    }

    #[test]
    fn removed_tree_is_recreated_empty() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_feature("layer/old", fid("old"), ObjectId::NULL, None).unwrap();
        let root = editor.write().unwrap();

        let mut editor = TreeEditor::new(&db, root);
        editor.remove("layer").unwrap();
        editor.put_feature("layer/new", fid("new"), ObjectId::NULL, None).unwrap();
        let root = editor.write().unwrap();
        assert_eq!(features(&db, &root), vec![("layer/new".to_string(), fid("new"))]);
    }

    #[test]
    fn feature_in_the_way_is_an_error() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor.put_feature("f", fid("f"), ObjectId::NULL, None).unwrap();
        let root = editor.write().unwrap();
        let mut editor = TreeEditor::new(&db, root);
        editor.put_feature("f/child", fid("c"), ObjectId::NULL, None).unwrap();
        assert!(matches!(editor.write(), Err(TreeError::NotATree(p)) if p == "f"));
    }

    #[test]
    fn bounds_propagate_to_tree_nodes() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        editor
            .put_feature("l/a", fid("a"), ObjectId::NULL, Some(Envelope::of_point(1.0, 1.0)))
            .unwrap();
        editor
            .put_feature("l/b", fid("b"), ObjectId::NULL, Some(Envelope::of_point(3.0, -2.0)))
            .unwrap();
        let root = editor.write().unwrap();
        let layer = DepthSearch::new(&db).find(&root, "l").unwrap().unwrap();
        assert_eq!(layer.bounds(), Some(&Envelope::new(1.0, 3.0, -2.0, 1.0)));
    }

    #[test]
    fn rejects_bad_paths() {
        let db = InMemoryObjectDatabase::new();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone());
        assert!(editor.put_feature("", fid("x"), ObjectId::NULL, None).is_err());
        assert!(editor.put_feature("a//b", fid("x"), ObjectId::NULL, None).is_err());
        assert!(editor.remove("").is_err());
    }

    #[test]
    fn cancellation_stops_the_write() {
        let db = InMemoryObjectDatabase::new();
        let listener = DefaultProgressListener::new();
        listener.cancel();
        let mut editor = TreeEditor::new(&db, RevTree::empty().clone()).with_listener(&listener);
        editor.put_feature("a/b", fid("b"), ObjectId::NULL, None).unwrap();
        assert!(matches!(editor.write(), Err(TreeError::Canceled)));
    }
}
