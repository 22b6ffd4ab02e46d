//! Diff between two root trees, optionally restricted to path prefixes.

use std::collections::BTreeSet;

use gv_store::{NodeRef, ObjectDatabase, RevTree};
use gv_tree::DepthSearch;
use gv_types::{path, ObjectId, ProgressListener};
use tracing::debug;

use crate::counter::{DiffCounter, DiffObjectCount};
use crate::entry::DiffEntry;
use crate::error::{DiffError, DiffResult};
use crate::tree_diff::TreeDiffEntryIterator;

/// Boxed lazy sequence of diff entries.
pub type DiffEntries<'a> = Box<dyn Iterator<Item = DiffResult<DiffEntry>> + 'a>;

/// A diff query between two root trees.
///
/// Without path filters the whole trees are compared. With filters, each
/// filtered path is resolved on both sides and only the nodes at and below
/// it are compared. When trees are reported, the ancestors of a changed
/// filtered node are reported too, once each.
pub struct DiffTree<'a> {
    db: &'a dyn ObjectDatabase,
    old_tree: ObjectId,
    new_tree: ObjectId,
    path_filters: Vec<String>,
    report_trees: bool,
    listener: Option<&'a dyn ProgressListener>,
}

impl<'a> DiffTree<'a> {
    pub fn new(db: &'a dyn ObjectDatabase) -> Self {
        Self {
            db,
            old_tree: RevTree::empty_id(),
            new_tree: RevTree::empty_id(),
            path_filters: Vec::new(),
            report_trees: false,
            listener: None,
        }
    }

    pub fn old_tree(mut self, id: ObjectId) -> Self {
        self.old_tree = id;
        self
    }

    pub fn new_tree(mut self, id: ObjectId) -> Self {
        self.new_tree = id;
        self
    }

    pub fn filter(mut self, path: impl Into<String>) -> Self {
        self.path_filters.push(path.into());
        self
    }

    pub fn filters<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_filters.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn report_trees(mut self, report: bool) -> Self {
        self.report_trees = report;
        self
    }

    /// Stop with [`DiffError::Canceled`] once `listener` is canceled.
    pub fn with_listener(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn check_canceled(&self) -> DiffResult<()> {
        match self.listener {
            Some(listener) if listener.is_canceled() => Err(DiffError::Canceled),
            _ => Ok(()),
        }
    }

    fn entries(&self, iter: TreeDiffEntryIterator<'a>) -> TreeDiffEntryIterator<'a> {
        match self.listener {
            Some(listener) => iter.with_listener(listener),
            None => iter,
        }
    }

    fn counter(&self) -> DiffCounter<'a> {
        let counter = DiffCounter::new(self.db);
        match self.listener {
            Some(listener) => counter.with_listener(listener),
            None => counter,
        }
    }

    /// Filters without duplicates or paths covered by another filter.
    /// `None` means the whole tree.
    fn effective_filters(&self) -> DiffResult<Option<Vec<String>>> {
        let mut filters = BTreeSet::new();
        for filter in &self.path_filters {
            if !path::is_valid(filter) {
                return Err(DiffError::InvalidDiffEntry(format!("invalid path filter '{filter}'")));
            }
            if filter.is_empty() {
                return Ok(None);
            }
            filters.insert(filter.as_str());
        }
        if filters.is_empty() {
            return Ok(None);
        }
        let kept = filters
            .iter()
            .filter(|f| !filters.iter().any(|other| path::is_child(other, f)))
            .map(|f| f.to_string())
            .collect();
        Ok(Some(kept))
    }

    pub fn call(&self) -> DiffResult<DiffEntries<'a>> {
        let filters = self.effective_filters()?;
        if self.old_tree == self.new_tree {
            return Ok(Box::new(std::iter::empty()));
        }
        let old = self.db.get_tree(&self.old_tree)?;
        let new = self.db.get_tree(&self.new_tree)?;
        let Some(filters) = filters else {
            return Ok(Box::new(self.entries(TreeDiffEntryIterator::new(
                self.db,
                &old,
                &new,
                self.report_trees,
            ))));
        };
        debug!(
            old = %self.old_tree.short_hex(),
            new = %self.new_tree.short_hex(),
            filters = filters.len(),
            "filtered diff"
        );

        let search = DepthSearch::new(self.db);
        let mut reported_ancestors = BTreeSet::new();
        let mut result: DiffEntries<'a> = Box::new(std::iter::empty());
        for filter in &filters {
            self.check_canceled()?;
            let left = search.find(&old, filter)?;
            let right = search.find(&new, filter)?;
            if same_node(left.as_ref(), right.as_ref()) {
                continue;
            }
            let mut head = Vec::new();
            if self.report_trees {
                for ancestor in path::all_paths_to(path::parent_path(filter)) {
                    if !reported_ancestors.insert(ancestor.clone()) {
                        continue;
                    }
                    let l = search.find(&old, &ancestor)?.filter(NodeRef::is_tree);
                    let r = search.find(&new, &ancestor)?.filter(NodeRef::is_tree);
                    if !same_node(l.as_ref(), r.as_ref()) {
                        head.push(DiffEntry::new(l, r)?);
                    }
                }
            }
            let tail = self.node_changes(left, right, &mut head)?;
            result = Box::new(result.chain(head.into_iter().map(Ok)).chain(tail));
        }
        Ok(result)
    }

    /// Entries for one resolved filter node: the node itself and, for trees,
    /// everything below it. Eager entries go to `head`.
    fn node_changes(
        &self,
        left: Option<NodeRef>,
        right: Option<NodeRef>,
        head: &mut Vec<DiffEntry>,
    ) -> DiffResult<DiffEntries<'a>> {
        let mut tail: DiffEntries<'a> = Box::new(std::iter::empty());
        let kinds_differ = matches!((&left, &right), (Some(l), Some(r)) if l.node_type() != r.node_type());
        if kinds_differ {
            tail = self.chain_side(tail, left, None, head)?;
            return self.chain_side(tail, None, right, head);
        }
        self.chain_side(tail, left, right, head)
    }

    fn chain_side(
        &self,
        tail: DiffEntries<'a>,
        left: Option<NodeRef>,
        right: Option<NodeRef>,
        head: &mut Vec<DiffEntry>,
    ) -> DiffResult<DiffEntries<'a>> {
        let Some(node) = right.as_ref().or(left.as_ref()) else {
            return Ok(tail);
        };
        if !node.is_tree() {
            head.push(DiffEntry::new(left, right)?);
            return Ok(tail);
        }
        let below = self.entries(TreeDiffEntryIterator::between(
            self.db,
            left.as_ref(),
            right.as_ref(),
            self.report_trees,
        )?);
        if !self.report_trees {
            return Ok(Box::new(tail.chain(below)));
        }
        let entry = DiffEntry::new(left, right)?;
        Ok(Box::new(tail.chain(std::iter::once(Ok(entry))).chain(below)))
    }

    /// Number of changed trees and features, without building entries.
    /// Ancestors of filtered paths are not counted.
    pub fn count(&self) -> DiffResult<DiffObjectCount> {
        let filters = self.effective_filters()?;
        if self.old_tree == self.new_tree {
            return Ok(DiffObjectCount::default());
        }
        let counter = self.counter();
        let old = self.db.get_tree(&self.old_tree)?;
        let new = self.db.get_tree(&self.new_tree)?;
        let Some(filters) = filters else {
            return counter.count(&old, &new);
        };
        let search = DepthSearch::new(self.db);
        let mut count = DiffObjectCount::default();
        for filter in &filters {
            self.check_canceled()?;
            let left = search.find(&old, filter)?;
            let right = search.find(&new, filter)?;
            if same_node(left.as_ref(), right.as_ref()) {
                continue;
            }
            count += match (left.as_ref(), right.as_ref()) {
                (Some(l), Some(r)) if l.node_type() == r.node_type() => {
                    self.count_pair(&counter, Some(l), Some(r))?
                }
                (l, r) => {
                    self.count_pair(&counter, l, None)? + self.count_pair(&counter, None, r)?
                }
            };
        }
        Ok(count)
    }

    fn count_pair(
        &self,
        counter: &DiffCounter<'_>,
        left: Option<&NodeRef>,
        right: Option<&NodeRef>,
    ) -> DiffResult<DiffObjectCount> {
        let Some(node) = right.or(left) else {
            return Ok(DiffObjectCount::default());
        };
        if !node.is_tree() {
            return Ok(DiffObjectCount::new(0, 1));
        }
        let tree = |n: Option<&NodeRef>| match n {
            Some(n) => self.db.get_tree(&n.object_id()),
            None => Ok(RevTree::empty().clone()),
        };
        Ok(DiffObjectCount::new(1, 0) + counter.count(&tree(left)?, &tree(right)?)?)
    }
}

fn same_node(left: Option<&NodeRef>, right: Option<&NodeRef>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => l.node() == r.node(),
        _ => false,
    }
}
