//! Materialized-path codec.
//!
//! A node's ancestor chain is stored on the node itself as a comma-joined
//! sequence of ancestor ids, oldest first, ending with the id of the
//! immediate parent. The literal sentinel `root` marks the top of the tree:
//! a top-level node has `path == "root"`, and a child of node X has
//! `path == X.path + "," + X.id`.
//!
//! Pure functions over well-formed strings. An empty path is a caller-side
//! precondition violation, not something the codec defines behavior for.

use uuid::Uuid;

/// Sentinel id denoting the top of the tree.
pub const ROOT_SENTINEL: &str = "root";

/// The full ancestor chain, oldest ancestor first.
pub fn parent_chain(path: &str) -> Vec<&str> {
    path.split(',').collect()
}

/// Id of the immediate parent — the last element of the chain.
pub fn parent_id(path: &str) -> &str {
    debug_assert!(!path.is_empty());
    // rsplit always yields at least one element for a non-empty pattern split
    path.rsplit(',').next().unwrap_or(path)
}

/// The parent's own path: all elements except the last, comma-joined.
/// Empty when the immediate parent is the root sentinel.
pub fn parent_path(path: &str) -> String {
    match path.rsplit_once(',') {
        Some((head, _)) => head.to_string(),
        None => String::new(),
    }
}

/// True when the node sits directly under the tree root.
pub fn is_top_level(path: &str) -> bool {
    parent_id(path) == ROOT_SENTINEL
}

/// Build the path a child of the given parent must carry.
pub fn child_path(parent_path: &str, parent_id: &Uuid) -> String {
    format!("{parent_path},{parent_id}")
}
