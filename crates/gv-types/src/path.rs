//! Helpers for `/`-separated tree paths.
//!
//! Paths never start or end with a separator. The root is the empty string.

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Parent of `path`; `""` for a top-level path or the root.
pub fn parent_path(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of `path`.
pub fn node_name(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a parent path and a child name.
pub fn append_child(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{child}")
    }
}

/// Returns `true` if `path` lies strictly below `parent`, at any depth.
pub fn is_child(parent: &str, path: &str) -> bool {
    if parent.is_empty() {
        return !path.is_empty();
    }
    path.len() > parent.len() + 1
        && path.starts_with(parent)
        && path[parent.len()..].starts_with(PATH_SEPARATOR)
}

/// Returns `true` if `path` is an immediate child of `parent`.
pub fn is_direct_child(parent: &str, path: &str) -> bool {
    is_child(parent, path) && parent_path(path) == parent
}

/// Path segments, root first. The root path has no segments.
pub fn split(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(PATH_SEPARATOR).collect()
    }
}

/// Number of segments in `path`.
pub fn depth(path: &str) -> usize {
    split(path).len()
}

/// Every ancestor path of `path` followed by `path` itself, shallowest first.
///
/// `"a/b/c"` yields `["a", "a/b", "a/b/c"]`.
pub fn all_paths_to(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in split(path) {
        current = append_child(&current, segment);
        out.push(current.clone());
    }
    out
}

/// Returns `true` if `path` is a well-formed tree path.
pub fn is_valid(path: &str) -> bool {
    path.is_empty() || split(path).iter().all(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_name() {
        assert_eq!(parent_path("a/b/c"), "a/b");
        assert_eq!(parent_path("a"), "");
        assert_eq!(parent_path(""), "");
        assert_eq!(node_name("a/b/c"), "c");
        assert_eq!(node_name("a"), "a");
    }

    #[test]
    fn append_to_root_and_nested() {
        assert_eq!(append_child("", "roads"), "roads");
        assert_eq!(append_child("roads", "r1"), "roads/r1");
    }

    #[test]
    fn child_relationships() {
        assert!(is_child("a", "a/b"));
        assert!(is_child("a", "a/b/c"));
        assert!(!is_child("a", "ab/c"));
        assert!(!is_child("a", "a"));
        assert!(is_child("", "a"));
        assert!(is_direct_child("a", "a/b"));
        assert!(!is_direct_child("a", "a/b/c"));
        assert!(is_direct_child("", "a"));
    }

    #[test]
    fn all_paths_to_lists_ancestors() {
        assert_eq!(all_paths_to("a/b/c"), vec!["a", "a/b", "a/b/c"]);
        assert!(all_paths_to("").is_empty());
        assert_eq!(depth("a/b/c"), 3);
    }

    #[test]
    fn validity() {
        assert!(is_valid("a/b"));
        assert!(is_valid(""));
        assert!(!is_valid("a//b"));
        assert!(!is_valid("/a"));
        assert!(!is_valid("a/"));
    }
}
