//! Content-tree resolution: expand a content id into fetch units on disk.
//!
//! The walk fetches folder metadata recursively, creates directories as it
//! goes, and registers one `FetchUnit` per file leaf. A single `PathCounter`
//! is threaded through the entire walk so same-named entries get stable
//! `(1)`, `(2)` suffixes — the counter's scope is the whole resolve call,
//! not one directory, so collisions are disambiguated globally.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::control::AbortHandle;
use crate::dest::sanitize_filename;
use crate::retry::FetchError;

use super::api::ContentNode;

/// Provider of content metadata; implemented by the live API client and by
/// test fakes.
pub trait ContentSource {
    fn contents(
        &self,
        content_id: &str,
        password_hash: Option<&str>,
    ) -> Result<ContentNode, FetchError>;
}

/// One file to download: where it goes and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    pub path: PathBuf,
    pub link: String,
}

/// Result of a resolve call. Errors are accumulated per node, never thrown
/// past it; partial trees are normal.
#[derive(Debug, Default)]
pub struct ResolvedTree {
    pub units: Vec<FetchUnit>,
    pub errors: Vec<String>,
}

/// Occurrence counter per candidate path. First use keeps the name; later
/// uses get a parenthesized suffix.
#[derive(Debug, Default)]
struct PathCounter(HashMap<PathBuf, u32>);

impl PathCounter {
    /// Returns the collision-resolved path for `name` under `parent`.
    fn resolve(&mut self, parent: &Path, name: &str, is_dir: bool) -> PathBuf {
        let candidate = parent.join(sanitize_filename(name));
        let n = self.0.entry(candidate.clone()).or_insert(0);
        let count = *n;
        *n += 1;
        if count == 0 {
            return candidate;
        }
        if is_dir {
            return append_suffix(&candidate, count);
        }
        match candidate.extension().map(|e| e.to_owned()) {
            Some(ext) => {
                let stem = candidate.with_extension("");
                let mut named = append_suffix(&stem, count).into_os_string();
                named.push(".");
                named.push(ext);
                PathBuf::from(named)
            }
            None => append_suffix(&candidate, count),
        }
    }
}

fn append_suffix(path: &Path, count: u32) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!("({count})"));
    PathBuf::from(s)
}

/// Expands `root_id` into fetch units under `root_dir` (the pre-created
/// `<output>/<content-id>` directory). Checks `abort` between nodes and
/// returns a partial tree when stopped.
pub fn resolve_tree<S: ContentSource>(
    source: &S,
    root_dir: &Path,
    root_id: &str,
    password_hash: Option<&str>,
    abort: &AbortHandle,
) -> ResolvedTree {
    let mut tree = ResolvedTree::default();
    let mut counter = PathCounter::default();
    walk(
        source,
        root_dir,
        root_id,
        password_hash,
        &mut counter,
        &mut tree,
        abort,
    );
    tree
}

fn walk<S: ContentSource>(
    source: &S,
    parent_dir: &Path,
    content_id: &str,
    password_hash: Option<&str>,
    counter: &mut PathCounter,
    tree: &mut ResolvedTree,
    abort: &AbortHandle,
) {
    if abort.is_stopped() {
        return;
    }

    let node = match source.contents(content_id, password_hash) {
        Ok(node) => node,
        Err(e) => {
            tree.errors
                .push(format!("Failed to fetch content {content_id}: {e}"));
            return;
        }
    };

    if node.password_locked() {
        tree.errors.push(
            "Content is password protected. Please provide the correct password.".to_string(),
        );
        return;
    }

    // A root pointing at a single file has no folder level at all.
    if !node.is_folder() {
        let path = counter.resolve(parent_dir, &node.name, false);
        register_file(tree, path, node.link);
        return;
    }

    // The tree root reuses the pre-created <output>/<content-id> directory
    // verbatim; nesting the folder's own name under it would add a
    // redundant level.
    let dir = if parent_dir.file_name().and_then(|n| n.to_str()) == Some(content_id) {
        parent_dir.to_path_buf()
    } else {
        counter.resolve(parent_dir, &node.name, true)
    };

    if let Err(e) = fs::create_dir_all(&dir) {
        tree.errors
            .push(format!("Failed to create {}: {e}", dir.display()));
        return;
    }

    for child in node.children.values() {
        if abort.is_stopped() {
            return;
        }
        if child.is_folder() {
            walk(source, &dir, &child.id, password_hash, counter, tree, abort);
        } else {
            let path = counter.resolve(&dir, &child.name, false);
            register_file(tree, path, child.link.clone());
        }
    }
}

fn register_file(tree: &mut ResolvedTree, path: PathBuf, link: Option<String>) {
    match link {
        Some(link) if !link.is_empty() => tree.units.push(FetchUnit { path, link }),
        _ => tree
            .errors
            .push(format!("No download link for {}", path.display())),
    }
}
