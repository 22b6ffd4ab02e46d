use gv_dag::{CommitLog, CommonAncestorSearch, StoreCommitGraph};
use gv_diff::{DiffEntry, DiffObjectCount, DiffResult, DiffTree, FeatureDiff};
use gv_merge::{merge_trees, ConflictsReport, MergeError, MergeScenario};
use gv_patch::{ApplyPatch, Patch};
use gv_refs::{names, InMemoryRefDatabase, Ref, RefDatabase, RefError};
use gv_store::{
    CommitBuilder, InMemoryObjectDatabase, NodeRef, ObjectDatabase, RevCommit, RevFeature,
    RevFeatureType, RevObject, RevPerson, RevTag, RevTree,
};
use gv_tree::{DepthSearch, TreeEditor, TreeResult};
use gv_types::{path, ObjectId};
use tracing::debug;

use crate::commit::{CommitOptions, MergeStatus};
use crate::config::RepositoryConfig;
use crate::error::{SdkError, SdkResult};
use crate::status::Status;

/// Abbreviated ids shorter than this are not looked up.
const MIN_ABBREVIATION: usize = 4;

/// A versioned repository of geospatial features.
///
/// Holds the object database, the refs, a working tree (`WORK_HEAD`) that
/// edits accumulate in, and a staging area (`STAGE_HEAD`) holding what the
/// next commit records.
pub struct Repository {
    config: RepositoryConfig,
    objects: InMemoryObjectDatabase,
    refs: InMemoryRefDatabase,
}

impl Repository {
    /// An empty repository on the unborn `master` branch.
    pub fn init() -> SdkResult<Self> {
        Self::with_config(RepositoryConfig::default())
    }

    pub fn with_config(config: RepositoryConfig) -> SdkResult<Self> {
        let refs = InMemoryRefDatabase::initialized();
        refs.put_ref(Ref::direct(names::WORK_HEAD, RevTree::empty_id()))?;
        refs.put_ref(Ref::direct(names::STAGE_HEAD, RevTree::empty_id()))?;
        debug!("initialized repository");
        Ok(Self {
            config,
            objects: InMemoryObjectDatabase::new(),
            refs,
        })
    }

    // ---- Working tree operations ----

    /// The root tree edits are applied to.
    pub fn work_tree(&self) -> SdkResult<RevTree> {
        self.tree_at(names::WORK_HEAD)
    }

    fn tree_at(&self, name: &str) -> SdkResult<RevTree> {
        let id = self.refs.resolve_id(name)?.unwrap_or_else(RevTree::empty_id);
        Ok(self.objects.get_tree(&id)?)
    }

    /// Edit the working tree and record the result as the new `WORK_HEAD`.
    pub fn edit_work_tree<F>(&self, edit: F) -> SdkResult<RevTree>
    where
        F: FnOnce(&mut TreeEditor<'_>) -> TreeResult<()>,
    {
        let mut editor =
            TreeEditor::new(&self.objects, self.work_tree()?).with_config(self.config.tree.clone());
        edit(&mut editor)?;
        let tree = editor.write()?;
        self.refs.update_ref(names::WORK_HEAD, tree.id())?;
        Ok(tree)
    }

    /// Create or retype the tree at `path`, storing `feature_type`.
    pub fn create_type_tree(&self, path: &str, feature_type: &RevFeatureType) -> SdkResult<RevTree> {
        self.objects.put(&RevObject::FeatureType(feature_type.clone()))?;
        let metadata_id = feature_type.id();
        self.edit_work_tree(|editor| editor.put_tree(path, metadata_id))
    }

    /// Store `feature` and put it at `path` in the working tree. The
    /// feature takes the type of the tree it lands in.
    pub fn insert(&self, path: &str, feature: &RevFeature) -> SdkResult<RevTree> {
        self.objects.put(&RevObject::Feature(feature.clone()))?;
        let (id, bounds) = (feature.id(), feature.bounds());
        self.edit_work_tree(|editor| editor.put_feature(path, id, ObjectId::NULL, bounds))
    }

    /// Remove the feature or tree at `path` from the working tree.
    pub fn remove(&self, path: &str) -> SdkResult<RevTree> {
        self.edit_work_tree(|editor| editor.remove(path))
    }

    // ---- Staging operations ----

    /// The root tree the next commit records.
    pub fn stage_tree(&self) -> SdkResult<RevTree> {
        self.tree_at(names::STAGE_HEAD)
    }

    /// Copy the working tree state at `paths` into the staging area. An
    /// empty slice, or the root path, stages every change. A path missing
    /// from the working tree is removed from the staging area.
    pub fn add(&self, paths: &[&str]) -> SdkResult<RevTree> {
        let work = self.work_tree()?;
        if paths.is_empty() || paths.contains(&"") {
            self.refs.update_ref(names::STAGE_HEAD, work.id())?;
            debug!(tree = %work.id().short_hex(), "staged working tree");
            return Ok(work);
        }
        let stage = self.stage_tree()?;
        let search = DepthSearch::new(&self.objects);
        let mut editor =
            TreeEditor::new(&self.objects, stage.clone()).with_config(self.config.tree.clone());
        for &p in paths {
            let staged = search.find(&stage, p)?;
            let Some(node) = search.find(&work, p)? else {
                if staged.is_none() {
                    return Err(SdkError::NotFound(format!("{}:{p}", names::WORK_HEAD)));
                }
                editor.remove(p)?;
                continue;
            };
            if staged.is_some_and(|s| s.node() == node.node()) {
                continue;
            }
            // Trees created on the way down keep their working tree type.
            for ancestor in path::all_paths_to(node.parent_path()) {
                if search.find(&stage, &ancestor)?.is_some() {
                    continue;
                }
                if let Some(tree) = search.find(&work, &ancestor)? {
                    let metadata_id = tree.node().metadata_id().unwrap_or(ObjectId::NULL);
                    editor.put_tree(&ancestor, metadata_id)?;
                }
            }
            let parent = node.parent_path().to_string();
            editor.put_node(&parent, node.into_node())?;
        }
        let tree = editor.write()?;
        self.refs.update_ref(names::STAGE_HEAD, tree.id())?;
        debug!(paths = paths.len(), tree = %tree.id().short_hex(), "staged paths");
        Ok(tree)
    }

    /// Staged changes against `HEAD` and unstaged changes against the
    /// staging area.
    pub fn status(&self) -> SdkResult<Status> {
        let head = match self.head()? {
            Some(id) => self.objects.get_tree(&self.objects.get_commit(&id)?.tree_id())?,
            None => RevTree::empty().clone(),
        };
        let stage = self.stage_tree()?;
        let work = self.work_tree()?;
        let staged = DiffTree::new(&self.objects)
            .old_tree(head.id())
            .new_tree(stage.id());
        let unstaged = DiffTree::new(&self.objects)
            .old_tree(stage.id())
            .new_tree(work.id());
        Ok(Status {
            staged: staged.call()?.collect::<DiffResult<Vec<_>>>()?,
            staged_count: staged.count()?,
            unstaged: unstaged.call()?.collect::<DiffResult<Vec<_>>>()?,
            unstaged_count: unstaged.count()?,
        })
    }

    // ---- Commit operations ----

    /// The commit `HEAD` resolves to, or `None` on an unborn branch.
    pub fn head(&self) -> SdkResult<Option<ObjectId>> {
        Ok(self.refs.resolve_id(names::HEAD)?)
    }

    /// Commit the staging area on top of `HEAD`. Unstaged edits stay in the
    /// working tree. Committing an explicit tree from `options` resets both
    /// the working tree and the staging area to it.
    pub fn commit(&self, options: CommitOptions) -> SdkResult<RevCommit> {
        if options.stage_all {
            self.add(&[])?;
        }
        let tree_id = match options.tree {
            Some(id) => id,
            None => self.stage_tree()?.id(),
        };
        let parent = self.head()?;
        if let Some(parent_id) = parent {
            if !options.allow_empty && self.objects.get_commit(&parent_id)?.tree_id() == tree_id {
                return Err(SdkError::InvalidOperation("nothing to commit".into()));
            }
        }
        let mut author = options.author.unwrap_or_else(|| self.default_person());
        if let Some(timestamp) = options.timestamp {
            author = author.at(timestamp);
        }
        let commit = CommitBuilder::new()
            .tree_id(tree_id)
            .parent_ids(parent.into_iter().collect())
            .author(author)
            .message(options.message)
            .build()?;
        self.record_commit(&commit)?;
        if options.tree.is_some() {
            self.reset_trees(tree_id)?;
        }
        Ok(commit)
    }

    fn record_commit(&self, commit: &RevCommit) -> SdkResult<()> {
        self.objects.put(&RevObject::Commit(commit.clone()))?;
        self.refs.update_ref(names::HEAD, commit.id())?;
        debug!(
            commit = %commit.id().short_hex(),
            tree = %commit.tree_id().short_hex(),
            "recorded commit"
        );
        Ok(())
    }

    fn reset_trees(&self, tree_id: ObjectId) -> SdkResult<()> {
        self.refs.update_ref(names::WORK_HEAD, tree_id)?;
        self.refs.update_ref(names::STAGE_HEAD, tree_id)?;
        Ok(())
    }

    fn default_person(&self) -> RevPerson {
        RevPerson::new(
            self.config.author_name.as_deref(),
            self.config.author_email.as_deref(),
            0,
            0,
        )
    }

    // ---- Refspec resolution ----

    /// Resolve a refspec to an object id.
    ///
    /// Accepts ref names (full or short), full or abbreviated hex ids,
    /// first-parent suffixes (`HEAD~2`, `master^`), and `<tree-ish>:<path>`
    /// for a node inside a tree. Returns `Ok(None)` when nothing matches.
    pub fn resolve(&self, refspec: &str) -> SdkResult<Option<ObjectId>> {
        if let Some((treeish, path)) = refspec.split_once(':') {
            let Some(id) = self.resolve(treeish)? else {
                return Ok(None);
            };
            let tree = self.tree_of(id)?;
            let node = DepthSearch::new(&self.objects).find(&tree, path)?;
            return Ok(node.map(|n| n.object_id()));
        }

        let (base, generations) = split_ancestry(refspec);
        let Some(mut id) = self.resolve_name(refspec, base)? else {
            return Ok(None);
        };
        for _ in 0..generations {
            let commit = self.peel_to_commit(id)?.ok_or_else(|| {
                SdkError::InvalidOperation(format!("'{base}' does not name a commit"))
            })?;
            match commit.parent_n(0) {
                Some(parent) => id = parent,
                None => return Ok(None),
            }
        }
        Ok(Some(id))
    }

    /// Like [`resolve`](Self::resolve), but a refspec that matches nothing
    /// is an error.
    pub fn resolve_required(&self, refspec: &str) -> SdkResult<ObjectId> {
        self.resolve(refspec)?
            .ok_or_else(|| SdkError::NotFound(refspec.to_string()))
    }

    /// The commit a refspec names, peeling tags.
    pub fn resolve_commit(&self, refspec: &str) -> SdkResult<RevCommit> {
        let id = self.resolve_required(refspec)?;
        self.peel_to_commit(id)?
            .ok_or_else(|| SdkError::InvalidOperation(format!("'{refspec}' does not name a commit")))
    }

    /// The root tree a refspec names: a tree, or the tree of a commit or tag.
    pub fn resolve_tree(&self, refspec: &str) -> SdkResult<RevTree> {
        let id = self.resolve_required(refspec)?;
        self.tree_of(id)
    }

    fn resolve_name(&self, refspec: &str, name: &str) -> SdkResult<Option<ObjectId>> {
        if let Some(found) = self.refs.find(name)? {
            return Ok(self.refs.resolve_id(found.name())?);
        }
        if name.len() < MIN_ABBREVIATION || !name.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let mut matches = self.objects.lookup(&name.to_ascii_lowercase())?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(SdkError::AmbiguousRefspec {
                refspec: refspec.to_string(),
                matches,
            }),
        }
    }

    fn peel_to_commit(&self, id: ObjectId) -> SdkResult<Option<RevCommit>> {
        match self.objects.get_if_present(&id)? {
            Some(RevObject::Commit(commit)) => Ok(Some(commit)),
            Some(RevObject::Tag(tag)) => Ok(Some(self.objects.get_commit(&tag.commit_id())?)),
            _ => Ok(None),
        }
    }

    fn tree_of(&self, id: ObjectId) -> SdkResult<RevTree> {
        if id == RevTree::empty_id() {
            return Ok(RevTree::empty().clone());
        }
        match self.objects.get(&id)? {
            RevObject::Tree(tree) => Ok(tree),
            RevObject::Commit(commit) => Ok(self.objects.get_tree(&commit.tree_id())?),
            RevObject::Tag(tag) => {
                let commit = self.objects.get_commit(&tag.commit_id())?;
                Ok(self.objects.get_tree(&commit.tree_id())?)
            }
            other => Err(SdkError::InvalidOperation(format!(
                "{} is a {}, not a tree",
                id.short_hex(),
                other.object_type().name()
            ))),
        }
    }

    // ---- Branch operations ----

    /// Create branch `name` at the commit `start` resolves to.
    pub fn create_branch(&self, name: &str, start: &str) -> SdkResult<ObjectId> {
        names::validate_branch_name(name)?;
        let full = names::branch_ref(name);
        if self.refs.get_ref(&full)?.is_some() {
            return Err(RefError::AlreadyExists { name: full }.into());
        }
        let commit = self.resolve_commit(start)?;
        self.refs.put_ref(Ref::direct(full, commit.id()))?;
        debug!(branch = name, commit = %commit.id().short_hex(), "created branch");
        Ok(commit.id())
    }

    /// Make `name` the current branch and reset the working tree to its tip.
    pub fn checkout(&self, name: &str) -> SdkResult<()> {
        let full = names::branch_ref(name);
        let tip = self
            .refs
            .resolve_id(&full)?
            .ok_or_else(|| SdkError::BranchNotFound(name.to_string()))?;
        let commit = self.objects.get_commit(&tip)?;
        self.refs.set_symbolic(names::HEAD, &full)?;
        self.reset_trees(commit.tree_id())?;
        debug!(branch = name, "checked out branch");
        Ok(())
    }

    /// Short name of the current branch, `None` when `HEAD` is detached.
    pub fn current_branch(&self) -> SdkResult<Option<String>> {
        Ok(self
            .refs
            .get_ref(names::HEAD)?
            .and_then(|head| head.target().map(|t| names::short_name(t).to_string())))
    }

    pub fn branches(&self) -> SdkResult<Vec<String>> {
        Ok(self
            .refs
            .branches()?
            .iter()
            .map(|r| r.short_name().to_string())
            .collect())
    }

    /// Tag the commit `refspec` resolves to.
    pub fn tag(&self, name: &str, refspec: &str, message: &str) -> SdkResult<RevTag> {
        names::validate_tag_name(name)?;
        let full = names::tag_ref(name);
        if self.refs.get_ref(&full)?.is_some() {
            return Err(RefError::AlreadyExists { name: full }.into());
        }
        let commit = self.resolve_commit(refspec)?;
        let tagger = self
            .default_person()
            .at(chrono::Utc::now().timestamp_millis());
        let tag = RevTag::new(name, commit.id(), message, tagger);
        self.objects.put(&RevObject::Tag(tag.clone()))?;
        self.refs.put_ref(Ref::direct(full, tag.id()))?;
        Ok(tag)
    }

    // ---- History operations ----

    /// Commits reachable from `refspec`, newest first.
    pub fn log(&self, refspec: &str) -> SdkResult<Vec<RevCommit>> {
        let start = self.resolve_commit(refspec)?;
        let graph = StoreCommitGraph::new(&self.objects);
        CommitLog::new(&graph, start.id())?
            .map(|id| -> SdkResult<RevCommit> { Ok(self.objects.get_commit(&id?)?) })
            .collect()
    }

    /// The closest commit both refspecs descend from.
    pub fn common_ancestor(&self, left: &str, right: &str) -> SdkResult<Option<ObjectId>> {
        let left = self.resolve_commit(left)?;
        let right = self.resolve_commit(right)?;
        let graph = StoreCommitGraph::new(&self.objects);
        Ok(CommonAncestorSearch::new(&graph)
            .with_config(self.config.ancestry.clone())
            .find(left.id(), right.id())?)
    }

    // ---- Diff operations ----

    /// Feature changes between two tree-ish refspecs.
    pub fn diff(&self, old: &str, new: &str) -> SdkResult<Vec<DiffEntry>> {
        self.diff_paths(old, new, &[])
    }

    /// Feature changes restricted to `paths` and what lies below them.
    pub fn diff_paths(&self, old: &str, new: &str, paths: &[&str]) -> SdkResult<Vec<DiffEntry>> {
        let entries = self
            .diff_tree(old, new)?
            .filters(paths.iter().copied())
            .call()?;
        Ok(entries.collect::<DiffResult<Vec<_>>>()?)
    }

    /// Number of changed trees and features between two refspecs.
    pub fn diff_count(&self, old: &str, new: &str) -> SdkResult<DiffObjectCount> {
        Ok(self.diff_tree(old, new)?.count()?)
    }

    /// Attribute-level changes to the feature at `path`.
    pub fn diff_feature(&self, old: &str, new: &str, path: &str) -> SdkResult<FeatureDiff> {
        let old_node = self.feature_node(old, path)?;
        let new_node = self.feature_node(new, path)?;
        let old_type = self.feature_type_of(&old_node)?;
        let new_type = self.feature_type_of(&new_node)?;
        Ok(FeatureDiff::compute(
            path,
            &self.objects.get_feature(&old_node.object_id())?,
            &self.objects.get_feature(&new_node.object_id())?,
            &old_type,
            &new_type,
            false,
        ))
    }

    fn diff_tree(&self, old: &str, new: &str) -> SdkResult<DiffTree<'_>> {
        let old = self.resolve_tree(old)?;
        let new = self.resolve_tree(new)?;
        Ok(DiffTree::new(&self.objects)
            .old_tree(old.id())
            .new_tree(new.id()))
    }

    fn feature_node(&self, refspec: &str, path: &str) -> SdkResult<NodeRef> {
        let tree = self.resolve_tree(refspec)?;
        match DepthSearch::new(&self.objects).find(&tree, path)? {
            Some(node) if node.is_feature() => Ok(node),
            Some(_) => Err(SdkError::InvalidOperation(format!("'{path}' is not a feature"))),
            None => Err(SdkError::NotFound(format!("{refspec}:{path}"))),
        }
    }

    fn feature_type_of(&self, node: &NodeRef) -> SdkResult<RevFeatureType> {
        let metadata_id = node.metadata_id();
        if metadata_id.is_null() {
            return Err(SdkError::InvalidOperation(format!(
                "'{}' has no feature type",
                node.path()
            )));
        }
        Ok(self.objects.get_feature_type(&metadata_id)?)
    }

    // ---- Merge operations ----

    /// Conflicts and clean changes merging `refspec` into `HEAD` would give.
    pub fn merge_report(&self, refspec: &str) -> SdkResult<ConflictsReport> {
        let (ours, theirs, ancestor) = self.merge_heads(refspec)?;
        let scenario = MergeScenario::new(
            &self.objects,
            self.objects.get_tree(&ancestor.tree_id())?,
            self.objects.get_tree(&ours.tree_id())?,
            self.objects.get_tree(&theirs.tree_id())?,
        );
        Ok(scenario.report()?)
    }

    /// Merge the commit `refspec` resolves to into `HEAD`.
    ///
    /// `ORIG_HEAD` records where `HEAD` was. When the merge conflicts,
    /// `MERGE_HEAD` records the commit being merged, nothing else moves,
    /// and the conflicts come back in [`MergeError::Conflicts`].
    pub fn merge(&self, refspec: &str, message: Option<&str>) -> SdkResult<MergeStatus> {
        let (ours, theirs, ancestor) = self.merge_heads(refspec)?;
        self.refs.put_ref(Ref::direct(names::ORIG_HEAD, ours.id()))?;

        if ours.id() == theirs.id() || ancestor.id() == theirs.id() {
            return Ok(MergeStatus::UpToDate(ours.id()));
        }
        if ancestor.id() == ours.id() {
            self.refs.update_ref(names::HEAD, theirs.id())?;
            self.reset_trees(theirs.tree_id())?;
            debug!(commit = %theirs.id().short_hex(), "fast-forwarded");
            return Ok(MergeStatus::FastForward(theirs.id()));
        }

        let outcome = merge_trees(
            &self.objects,
            &self.objects.get_tree(&ancestor.tree_id())?,
            &self.objects.get_tree(&ours.tree_id())?,
            &self.objects.get_tree(&theirs.tree_id())?,
        );
        let tree = match outcome {
            Ok(outcome) => outcome.tree().clone(),
            Err(MergeError::Conflicts(report)) => {
                self.refs.put_ref(Ref::direct(names::MERGE_HEAD, theirs.id()))?;
                debug!(conflicts = report.conflicts.len(), "merge stopped on conflicts");
                return Err(MergeError::Conflicts(report).into());
            }
            Err(e) => return Err(e.into()),
        };

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Merge '{refspec}'"));
        let commit = CommitBuilder::new()
            .tree_id(tree.id())
            .parent_ids(vec![ours.id(), theirs.id()])
            .author(self.default_person())
            .message(message)
            .build()?;
        self.record_commit(&commit)?;
        self.reset_trees(tree.id())?;
        self.refs.remove_ref(names::MERGE_HEAD)?;
        Ok(MergeStatus::Merged(commit))
    }

    fn merge_heads(&self, refspec: &str) -> SdkResult<(RevCommit, RevCommit, RevCommit)> {
        let ours = self.resolve_commit(names::HEAD)?;
        let theirs = self.resolve_commit(refspec)?;
        let graph = StoreCommitGraph::new(&self.objects);
        let ancestor = CommonAncestorSearch::new(&graph)
            .with_config(self.config.ancestry.clone())
            .find(ours.id(), theirs.id())?
            .ok_or(SdkError::NoCommonAncestor(ours.id(), theirs.id()))?;
        let ancestor = self.objects.get_commit(&ancestor)?;
        Ok((ours, theirs, ancestor))
    }

    // ---- Patch operations ----

    /// The changes turning tree-ish `old` into tree-ish `new`.
    pub fn create_patch(&self, old: &str, new: &str) -> SdkResult<Patch> {
        let entries = self.diff_tree(old, new)?.report_trees(true).call()?;
        Ok(gv_patch::create_patch(&self.objects, entries)?)
    }

    /// Apply `patch` to the working tree. Returns the part of the patch
    /// that was rejected, always empty unless `partial` is set.
    pub fn apply_patch(&self, patch: &Patch, reverse: bool, partial: bool) -> SdkResult<Patch> {
        let applied = ApplyPatch::new(&self.objects, patch)
            .reverse(reverse)
            .partial(partial)
            .apply(&self.work_tree()?)?;
        self.refs.update_ref(names::WORK_HEAD, applied.tree.id())?;
        Ok(applied.rejected)
    }

    // ---- Accessors ----

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn objects(&self) -> &InMemoryObjectDatabase {
        &self.objects
    }

    pub fn refs(&self) -> &InMemoryRefDatabase {
        &self.refs
    }
}

/// Split trailing `^` and `~N` suffixes off a refspec, counting the
/// first-parent steps they ask for.
fn split_ancestry(refspec: &str) -> (&str, usize) {
    let mut base = refspec;
    let mut generations = 0;
    loop {
        if let Some(rest) = base.strip_suffix('^') {
            generations += 1;
            base = rest;
            continue;
        }
        if let Some(pos) = base.rfind('~') {
            let digits = &base[pos + 1..];
            let steps = if digits.is_empty() { Ok(1) } else { digits.parse::<usize>() };
            if let Ok(steps) = steps {
                generations += steps;
                base = &base[..pos];
                continue;
            }
        }
        return (base, generations);
    }
}
