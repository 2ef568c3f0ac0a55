//! Lexical path handling. Nothing in here touches the volume.
//!
//! Paths are `/`-separated. A leading `/` makes a path absolute; otherwise it
//! is relative to a current directory.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Splits off the first element of a path. The remainder is `None` when there
/// was no separator, and `Some("")` when the separator was the last
/// character.
pub(crate) fn next_path_element(path: &str) -> (&str, Option<&str>) {
    match path.split_once('/') {
        Some((element, rest)) => (element, Some(rest)),
        None => (path, None),
    }
}

/// Splits a path at its last separator into the parent path and the leaf
/// name. The parent is `None` when the path has no separator at all.
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    }
}

/// Normalizes a path without looking at the filesystem: empty and `.`
/// elements are dropped, `..` drops the previous element (or nothing, at the
/// root). The result always starts with a single `/` and never ends with one
/// unless it is the root.
pub fn normalize(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    normalized.push_str(&components.join("/"));
    normalized
}

/// Resolves `destination` against `current` into a normalized absolute path.
/// Without a destination, `current` is returned unchanged.
pub fn absolute_path(current: &str, destination: Option<&str>) -> String {
    let Some(destination) = destination else {
        return current.to_string();
    };

    if destination.starts_with('/') {
        return normalize(destination);
    }

    let mut joined = String::with_capacity(current.len() + destination.len() + 1);
    joined.push_str(current);
    if current != "/" {
        joined.push('/');
    }
    joined.push_str(destination);
    normalize(&joined)
}
