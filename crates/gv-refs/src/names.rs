//! Well-known ref names and ref name validation.
//!
//! Full ref names are either one of the well-known pointers below or a path
//! under `refs/`. Branch and tag names follow git-style conventions:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Components between slashes must be non-empty

use crate::error::{RefError, RefResult};

/// The current branch, or the commit checked out when detached.
pub const HEAD: &str = "HEAD";
/// Root tree of the working tree.
pub const WORK_HEAD: &str = "WORK_HEAD";
/// Root tree of the staging area.
pub const STAGE_HEAD: &str = "STAGE_HEAD";
/// HEAD as it was before a merge or rebase moved it.
pub const ORIG_HEAD: &str = "ORIG_HEAD";
/// The commit being merged into HEAD.
pub const MERGE_HEAD: &str = "MERGE_HEAD";

pub const REFS_PREFIX: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// The default branch.
pub const MASTER: &str = "refs/heads/master";

const WELL_KNOWN: &[&str] = &[HEAD, WORK_HEAD, STAGE_HEAD, ORIG_HEAD, MERGE_HEAD];

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Full name of branch `name`.
pub fn branch_ref(name: &str) -> String {
    format!("{HEADS_PREFIX}{name}")
}

/// Full name of tag `name`.
pub fn tag_ref(name: &str) -> String {
    format!("{TAGS_PREFIX}{name}")
}

/// `name` without its `refs/heads/`, `refs/tags/`, `refs/remotes/`, or
/// `refs/` prefix.
pub fn short_name(name: &str) -> &str {
    [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX, REFS_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Full names a short name may refer to, in lookup order.
pub fn candidates(name: &str) -> [String; 5] {
    [
        name.to_string(),
        format!("{REFS_PREFIX}{name}"),
        tag_ref(name),
        branch_ref(name),
        format!("{REMOTES_PREFIX}{name}"),
    ]
}

/// Validate a full ref name.
pub fn validate_ref_name(name: &str) -> RefResult<()> {
    if WELL_KNOWN.contains(&name) {
        return Ok(());
    }
    match name.strip_prefix(REFS_PREFIX) {
        Some(rest) => validate_branch_name(rest).map_err(|e| match e {
            RefError::InvalidName { reason, .. } => invalid(name, reason),
            other => other,
        }),
        None => Err(invalid(name, "must be a well-known name or start with 'refs/'")),
    }
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use gv_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("master").is_ok());
/// assert!(validate_branch_name("roads/fixes").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    Ok(())
}

/// Validate a tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> RefResult<()> {
    validate_branch_name(name)
}

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_branch_names() {
        for name in ["master", "roads/fixes", "v1.0", "a-b_c"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_branch_names() {
        for name in [
            "", "a b", "a~1", "a^", "a:b", "a..b", "a@{1}", ".a", "a.", "/a", "a/", "a.lock",
            "a//b", "a/.b",
        ] {
            assert!(
                matches!(validate_branch_name(name), Err(RefError::InvalidName { .. })),
                "{name:?}"
            );
        }
    }

    #[test]
    fn full_names() {
        assert!(validate_ref_name(HEAD).is_ok());
        assert!(validate_ref_name(WORK_HEAD).is_ok());
        assert!(validate_ref_name(MASTER).is_ok());
        assert!(validate_ref_name("refs/tags/v1").is_ok());
        assert!(validate_ref_name("master").is_err());
        assert!(validate_ref_name("refs/").is_err());
        match validate_ref_name("refs/heads/a..b") {
            Err(RefError::InvalidName { name, .. }) => assert_eq!(name, "refs/heads/a..b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_names_and_candidates() {
        assert_eq!(short_name("refs/heads/master"), "master");
        assert_eq!(short_name("refs/tags/v1"), "v1");
        assert_eq!(short_name("refs/remotes/origin/master"), "origin/master");
        assert_eq!(short_name("HEAD"), "HEAD");
        assert_eq!(branch_ref("dev"), "refs/heads/dev");
        assert_eq!(candidates("v1")[2], "refs/tags/v1");
        assert_eq!(candidates("v1")[3], "refs/heads/v1");
    }
}
