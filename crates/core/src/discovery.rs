//! Graph file discovery with gitignore-aware filtering
//!
//! Used by the bulk importer to find graph documents under a directory.
//! Patterns are globs relative to the search root.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::warn;

/// Patterns matched by [`discover_graph_files`]
pub const GRAPH_FILE_PATTERNS: &[&str] = &["**/*.json"];

/// Discover files matching glob patterns under `root`
///
/// # Returns
/// Absolute paths of matching files, sorted, excluding anything matched by
/// `.gitignore`. An unreadable root or an invalid pattern yields an empty list.
///
/// # Example
/// ```no_run
/// use tcmkg_core::discovery;
///
/// let files = discovery::discover_files(std::path::Path::new("data"), &["herbs/**/*.json"]);
/// println!("Found {} files", files.len());
/// ```
pub fn discover_files(root: &Path, patterns: &[&str]) -> Vec<PathBuf> {
    // Canonicalize root upfront so every returned path is absolute
    let canonical_root = match root.canonicalize() {
        Ok(path) => path,
        Err(err) => {
            warn!(root = %root.display(), error = %err, "cannot search directory");
            return Vec::new();
        }
    };

    let matcher = match build_glob_matcher(patterns) {
        Ok(matcher) => matcher,
        Err(err) => {
            warn!(error = %err, "invalid discovery pattern");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for result in build_walker(&canonical_root) {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                // keep walking the rest of the tree
                warn!(error = %err, "error walking directory");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let matched = entry
            .path()
            .strip_prefix(&canonical_root)
            .is_ok_and(|rel| matcher.is_match(rel));
        if matched {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}

/// Discover JSON graph documents under `root`
pub fn discover_graph_files(root: &Path) -> Vec<PathBuf> {
    discover_files(root, GRAPH_FILE_PATTERNS)
}

fn build_glob_matcher(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .hidden(false)
        .parents(true);

    // WalkBuilder only honours .gitignore inside a git repository
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add_ignore(gitignore_path);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_discover_basic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("herbs.json")).unwrap();
        File::create(root.join("formulas.json")).unwrap();
        File::create(root.join("notes.txt")).unwrap();

        let files = discover_graph_files(root);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
        assert!(files[0].ends_with("formulas.json"));
        assert!(files[1].ends_with("herbs.json"));
    }

    #[test]
    fn test_respect_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let mut gitignore = File::create(root.join(".gitignore")).unwrap();
        gitignore.write_all(b"backup/\n*.bak.json\n").unwrap();

        fs::create_dir_all(root.join("backup")).unwrap();
        File::create(root.join("backup/old.json")).unwrap();
        File::create(root.join("graph.json")).unwrap();
        File::create(root.join("graph.bak.json")).unwrap();

        let files = discover_graph_files(root);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("graph.json"));
    }

    #[test]
    fn test_custom_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("herbs")).unwrap();
        fs::create_dir_all(root.join("cases")).unwrap();
        File::create(root.join("herbs/mahuang.json")).unwrap();
        File::create(root.join("cases/case1.json")).unwrap();
        File::create(root.join("top.json")).unwrap();

        let files = discover_files(root, &["herbs/**/*.json"]);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("herbs/mahuang.json"));
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_graph_files(&temp_dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("graph.json")).unwrap();
        assert!(discover_files(temp_dir.path(), &["[unclosed"]).is_empty());
    }

    #[test]
    fn test_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("a/b")).unwrap();
        File::create(root.join("a/one.json")).unwrap();
        File::create(root.join("a/b/two.json")).unwrap();

        let files = discover_graph_files(root);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
    }
}
