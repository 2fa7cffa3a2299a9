//! Materialized paths.
//!
//! A comment's path is the ids of its ancestors followed by its own id,
//! joined with [`DELIMITER`]. Ids are hyphenated UUIDs, which never contain
//! the delimiter, so a path can always be split back into ids.

use uuid::Uuid;

pub const DELIMITER: char = '.';

pub fn root(id: Uuid) -> String {
    id.to_string()
}

pub fn child(parent_path: &str, id: Uuid) -> String {
    format!("{parent_path}{DELIMITER}{id}")
}

/// Every descendant's path starts with this, and nothing else's does.
pub fn descendant_prefix(path: &str) -> String {
    format!("{path}{DELIMITER}")
}

pub fn depth(path: &str) -> i32 {
    path.matches(DELIMITER).count() as i32
}

/// Prefix match anchored on the delimiter, so that `ab` is not mistaken for
/// an ancestor of `abc.d`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(DELIMITER)
}
