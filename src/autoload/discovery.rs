use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

use crate::core::definition::Kind;

/// Upper bound on directory nesting; together with walkdir's loop detection
/// this keeps symlink cycles from recursing forever.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub enum FileMatcher {
    /// Exact base name `<kind>.json` / `<kind>.toml`.
    Convention(Kind),
    /// Glob over the path relative to the discovery root.
    Pattern(GlobMatcher),
}

impl FileMatcher {
    pub fn for_kind(kind: Kind, pattern: Option<&str>) -> Result<Self, globset::Error> {
        match pattern {
            Some(p) => Ok(FileMatcher::Pattern(Glob::new(p)?.compile_matcher())),
            None => Ok(FileMatcher::Convention(kind)),
        }
    }

    pub fn matches(&self, relative: &Path) -> bool {
        match self {
            FileMatcher::Convention(kind) => relative
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| kind.file_names().contains(&n)),
            FileMatcher::Pattern(glob) => glob.is_match(relative),
        }
    }
}

/// Every file under `root` accepted by `matcher`, as sorted canonical paths.
///
/// A missing root is an empty result. Unreadable entries and symlink loops
/// are logged and skipped.
pub fn discover(root: &Path, matcher: &FileMatcher) -> Vec<PathBuf> {
    let root = match root.canonicalize() {
        Ok(r) if r.is_dir() => r,
        _ => {
            tracing::debug!(root = %root.display(), "discovery root missing; nothing to load");
            return Vec::new();
        }
    };

    let mut found = BTreeSet::new();
    for entry in WalkDir::new(&root).follow_links(true).max_depth(MAX_DEPTH) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        if matcher.matches(relative) {
            // Two links to the same file must not yield two components.
            let path = entry.path().canonicalize().unwrap_or_else(|_| entry.path().to_path_buf());
            found.insert(path);
        }
    }

    tracing::debug!(root = %root.display(), files = found.len(), "discovery finished");
    found.into_iter().collect()
}
