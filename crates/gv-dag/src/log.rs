//! Newest-first walk over commit history.

use std::collections::{BinaryHeap, HashSet};

use gv_types::ObjectId;

use crate::error::DagResult;
use crate::graph::CommitGraph;

/// Lazy walk over every commit reachable from a start commit, newest
/// first. Ties in commit time are broken by id so the order is stable.
///
/// Each commit is visited once even when several paths lead to it.
pub struct CommitLog<'a> {
    graph: &'a dyn CommitGraph,
    queue: BinaryHeap<(i64, ObjectId)>,
    seen: HashSet<ObjectId>,
    until: Option<ObjectId>,
    failed: bool,
}

impl<'a> CommitLog<'a> {
    /// Walk from `start`. Fails if the graph does not contain it.
    pub fn new(graph: &'a dyn CommitGraph, start: ObjectId) -> DagResult<Self> {
        let timestamp = graph.timestamp(&start)?;
        let mut queue = BinaryHeap::new();
        queue.push((timestamp, start));
        Ok(Self {
            graph,
            queue,
            seen: HashSet::from([start]),
            until: None,
            failed: false,
        })
    }

    /// Stop at `commit`: it is still yielded, but its parents are not
    /// followed through it.
    pub fn until(mut self, commit: ObjectId) -> Self {
        self.until = Some(commit);
        self
    }

    fn advance(&mut self) -> DagResult<Option<ObjectId>> {
        let Some((_, id)) = self.queue.pop() else {
            return Ok(None);
        };
        if self.until != Some(id) {
            for parent in self.graph.parents(&id)? {
                if self.seen.insert(parent) {
                    let timestamp = self.graph.timestamp(&parent)?;
                    self.queue.push((timestamp, parent));
                }
            }
        }
        Ok(Some(id))
    }
}

impl Iterator for CommitLog<'_> {
    type Item = DagResult<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(next) => next.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DagError;
    use crate::graph::AncestryGraph;

    fn id(s: &str) -> ObjectId {
        ObjectId::for_string(s)
    }

    /// a <- b <- c <- e
    ///        \- d -/
    fn diamond() -> AncestryGraph {
        let graph = AncestryGraph::new();
        graph.put(id("a"), vec![], 1).unwrap();
        graph.put(id("b"), vec![id("a")], 2).unwrap();
        graph.put(id("c"), vec![id("b")], 3).unwrap();
        graph.put(id("d"), vec![id("b")], 4).unwrap();
        graph.put(id("e"), vec![id("c"), id("d")], 5).unwrap();
        graph
    }

    #[test]
    fn walks_newest_first_visiting_each_commit_once() {
        let graph = diamond();
        let log: Vec<ObjectId> = CommitLog::new(&graph, id("e"))
            .unwrap()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(log, vec![id("e"), id("d"), id("c"), id("b"), id("a")]);
    }

    #[test]
    fn until_stops_at_the_given_commit() {
        let graph = diamond();
        let log: Vec<ObjectId> = CommitLog::new(&graph, id("d"))
            .unwrap()
            .until(id("b"))
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(log, vec![id("d"), id("b")]);
    }

    #[test]
    fn unknown_start_is_an_error() {
        let graph = diamond();
        assert!(matches!(
            CommitLog::new(&graph, id("zz")),
            Err(DagError::NotFound(_))
        ));
    }
}
