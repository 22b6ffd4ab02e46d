use gv_diff::{DiffEntry, DiffObjectCount};

/// Changes between `HEAD`, the staging area, and the working tree.
#[derive(Clone, Debug, Default)]
pub struct Status {
    /// `HEAD` to `STAGE_HEAD`: what the next commit records.
    pub staged: Vec<DiffEntry>,
    pub staged_count: DiffObjectCount,
    /// `STAGE_HEAD` to `WORK_HEAD`: edits not yet added.
    pub unstaged: Vec<DiffEntry>,
    pub unstaged_count: DiffObjectCount,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }

    /// Paths of the staged changes, in diff order.
    pub fn staged_paths(&self) -> Vec<String> {
        self.staged.iter().map(DiffEntry::path).collect()
    }

    pub fn unstaged_paths(&self) -> Vec<String> {
        self.unstaged.iter().map(DiffEntry::path).collect()
    }
}
