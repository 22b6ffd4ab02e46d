//! Lowest common ancestor of two commits.
//!
//! The history of the right commit is loaded newest first in partitions of
//! [`AncestryConfig::partition_size`] commits. For each partition, a
//! breadth-first search from the left commit returns the first commit found
//! in the partition. Memory stays bounded by the partition size on very long
//! histories.

use std::collections::{HashSet, VecDeque};

use gv_types::{ObjectId, ProgressListener};
use tracing::debug;

use crate::config::AncestryConfig;
use crate::error::{DagError, DagResult};
use crate::graph::CommitGraph;
use crate::log::CommitLog;

pub struct CommonAncestorSearch<'a> {
    graph: &'a dyn CommitGraph,
    config: AncestryConfig,
    listener: Option<&'a dyn ProgressListener>,
}

impl<'a> CommonAncestorSearch<'a> {
    pub fn new(graph: &'a dyn CommitGraph) -> Self {
        Self {
            graph,
            config: AncestryConfig::default(),
            listener: None,
        }
    }

    pub fn with_config(mut self, config: AncestryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listener(mut self, listener: &'a dyn ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// The common ancestor of `left` and `right` closest to `left`, or
    /// `None` if the two histories are disjoint.
    pub fn find(&self, left: ObjectId, right: ObjectId) -> DagResult<Option<ObjectId>> {
        if left == right {
            return Ok(Some(left));
        }
        if self.config.partition_size == 0 {
            return Err(DagError::InvalidConfig("partition size must be positive".into()));
        }
        if !self.graph.contains(&left)? {
            return Err(DagError::NotFound(left));
        }
        if let Some(l) = self.listener {
            l.started();
        }

        let mut log = CommitLog::new(self.graph, right)?;
        let mut round = 0usize;
        let found = loop {
            if self.listener.is_some_and(|l| l.is_canceled()) {
                return Err(DagError::Canceled);
            }
            let partition = log
                .by_ref()
                .take(self.config.partition_size)
                .collect::<DagResult<HashSet<ObjectId>>>()?;
            if partition.is_empty() {
                break None;
            }
            round += 1;
            if let Some(ancestor) = self.search(left, &partition)? {
                break Some(ancestor);
            }
        };

        debug!(
            left = %left.short_hex(),
            right = %right.short_hex(),
            rounds = round,
            found = found.is_some(),
            "common ancestor search"
        );
        if let Some(l) = self.listener {
            l.complete();
        }
        Ok(found)
    }

    fn search(&self, start: ObjectId, partition: &HashSet<ObjectId>) -> DagResult<Option<ObjectId>> {
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);
        while let Some(commit) = queue.pop_front() {
            if partition.contains(&commit) {
                return Ok(Some(commit));
            }
            for parent in self.graph.parents(&commit)? {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(None)
    }
}

/// Common ancestor search with the default configuration.
pub fn find_common_ancestor(
    graph: &dyn CommitGraph,
    left: ObjectId,
    right: ObjectId,
) -> DagResult<Option<ObjectId>> {
    CommonAncestorSearch::new(graph).find(left, right)
}
