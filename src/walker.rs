//! Recursive file enumeration with folder exclusion.
//!
//! [`TreeWalker`] yields every regular file under a root, pruning whole
//! subtrees whose directory name is excluded. Unreadable entries do not stop
//! the walk; they are yielded as [`TraversalError`] items instead.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// A directory or file that could not be read during traversal.
#[derive(Debug, Clone, Error)]
#[error("Could not read {}: {message}", .path.display())]
pub struct TraversalError {
    /// The entry that failed, or the walk root if no entry path is known.
    pub path: PathBuf,
    pub message: String,
}

impl TraversalError {
    fn from_walkdir(error: walkdir::Error, root: &Path) -> Self {
        let path = error
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        let message = if let Some(ancestor) = error.loop_ancestor() {
            format!("symbolic link loop back to {}", ancestor.display())
        } else if let Some(io_error) = error.io_error() {
            io_error.to_string()
        } else {
            error.to_string()
        };

        Self { path, message }
    }
}

/// Lazily enumerates the files under a source root.
///
/// Every call to [`TreeWalker::walk`] starts a fresh traversal, so the same
/// walker can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    excluded_folders: HashSet<String>,
    recursive: bool,
    skipped_paths: Vec<PathBuf>,
}

impl TreeWalker {
    /// Creates a walker for `root`.
    ///
    /// Folder names are compared case-insensitively against each directory's
    /// base name. The root itself is never pruned. With `recursive` false only
    /// the root's direct file children are produced.
    pub fn new<I, S>(root: impl AsRef<Path>, excluded_folders: I, recursive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: make_absolute(root.as_ref()),
            excluded_folders: excluded_folders
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .collect(),
            recursive,
            skipped_paths: Vec::new(),
        }
    }

    /// Prunes one more subtree, identified by its path instead of its name.
    ///
    /// The path is compared after resolving `..` and symbolic links, so any
    /// spelling of the folder, or a link into it, is pruned.
    pub fn skip_path(mut self, path: impl AsRef<Path>) -> Self {
        self.skipped_paths.push(resolve(path.as_ref()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the tree, yielding absolute file paths in filesystem order.
    ///
    /// Symbolic links are followed; link loops, permission errors and entries
    /// that vanish mid-walk come out as `Err` items and the walk goes on.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, TraversalError>> + '_ {
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        WalkDir::new(&self.root)
            .follow_links(true)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(move |entry| !self.is_pruned(entry))
            .filter_map(move |item| match item {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(error) => {
                    let error = TraversalError::from_walkdir(error, &self.root);
                    warn!(path = %error.path.display(), "{}", error.message);
                    Some(Err(error))
                }
            })
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        self.excluded_folders.contains(&name) || self.is_skipped_path(entry)
    }

    /// Only directories that share a skipped folder's name, or that were
    /// reached through a link, are canonicalized.
    fn is_skipped_path(&self, entry: &DirEntry) -> bool {
        let candidate = entry.path_is_symlink()
            || self
                .skipped_paths
                .iter()
                .any(|path| path.file_name() == Some(entry.file_name()));
        if !candidate {
            return false;
        }

        match entry.path().canonicalize() {
            Ok(canonical) => self.skipped_paths.contains(&canonical),
            Err(_) => false,
        }
    }
}

fn make_absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Canonical form of a path that may not exist yet: `..` is folded away,
/// the deepest existing ancestor is canonicalized and the rest appended.
pub(crate) fn resolve(path: &Path) -> PathBuf {
    let absolute = make_absolute(path);
    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }

    let normalized = normalize_lexically(&absolute);
    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn collect(walker: &TreeWalker) -> HashSet<PathBuf> {
        walker.walk().map(|item| item.unwrap()).collect()
    }

    fn expected(root: &Path, rels: &[&str]) -> HashSet<PathBuf> {
        let root = make_absolute(root);
        rels.iter().map(|rel| root.join(rel)).collect()
    }

    #[test]
    fn test_walk_yields_all_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.txt");
        touch(root, "sub/b.jpg");
        touch(root, "sub/deeper/c.pdf");

        let walker = TreeWalker::new(root, Vec::<String>::new(), true);

        assert_eq!(
            collect(&walker),
            expected(root, &["a.txt", "sub/b.jpg", "sub/deeper/c.pdf"])
        );
    }

    #[test]
    fn test_excluded_folder_prunes_subtree_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "keep.txt");
        touch(root, "Temp/skip.txt");
        touch(root, "Temp/inner/skip_too.txt");
        touch(root, "nested/temp/skip.jpg");
        touch(root, "nested/keep.jpg");
        touch(root, "temp.txt");

        let walker = TreeWalker::new(root, ["temp"], true);

        assert_eq!(
            collect(&walker),
            expected(root, &["keep.txt", "nested/keep.jpg", "temp.txt"])
        );
    }

    #[test]
    fn test_root_is_never_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("temp");
        touch(&root, "a.txt");

        let walker = TreeWalker::new(&root, ["temp"], true);

        assert_eq!(collect(&walker), expected(&root, &["a.txt"]));
    }

    #[test]
    fn test_non_recursive_only_yields_direct_children() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "top.txt");
        touch(root, "sub/nested.txt");

        let walker = TreeWalker::new(root, Vec::<String>::new(), false);

        assert_eq!(collect(&walker), expected(root, &["top.txt"]));
    }

    #[test]
    fn test_walk_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "one.txt");
        touch(root, "sub/two.txt");

        let walker = TreeWalker::new(root, Vec::<String>::new(), true);

        let first = collect(&walker);
        let second = collect(&walker);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_skip_path_prunes_destination() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.txt");
        touch(root, "sorted/Bilder/jpg/old.jpg");

        let walker = TreeWalker::new(root, Vec::<String>::new(), true).skip_path(root.join("sorted"));

        assert_eq!(collect(&walker), expected(root, &["a.txt"]));
    }

    #[test]
    fn test_skip_path_matches_other_spellings() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.txt");
        touch(root, "sub/b.txt");
        touch(root, "sorted/Bilder/jpg/old.jpg");

        let walker = TreeWalker::new(root, Vec::<String>::new(), true)
            .skip_path(root.join("sub").join("..").join("sorted"));

        assert_eq!(collect(&walker), expected(root, &["a.txt", "sub/b.txt"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_path_prunes_links_into_destination() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.txt");
        touch(root, "sorted/Bilder/jpg/old.jpg");
        std::os::unix::fs::symlink(root.join("sorted"), root.join("shortcut")).unwrap();

        let walker = TreeWalker::new(root, Vec::<String>::new(), true).skip_path(root.join("sorted"));

        assert_eq!(collect(&walker), expected(root, &["a.txt"]));
    }

    #[test]
    fn test_resolve_folds_parent_components_of_missing_paths() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().canonicalize().unwrap();

        assert_eq!(
            resolve(&temp_dir.path().join("missing").join("..").join("sorted")),
            base.join("sorted")
        );
        assert_eq!(resolve(temp_dir.path()), base);
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let walker = TreeWalker::new(temp_dir.path().join("missing"), Vec::<String>::new(), true);

        let items: Vec<_> = walker.walk().collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_reported_and_walk_continues() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "loop/file.txt");
        std::os::unix::fs::symlink(root.join("loop"), root.join("loop").join("again")).unwrap();

        let walker = TreeWalker::new(root, Vec::<String>::new(), true);
        let (files, errors): (Vec<_>, Vec<_>) = walker.walk().partition(|item| item.is_ok());

        assert_eq!(files.len(), 1);
        assert_eq!(errors.len(), 1);
        let error = errors.into_iter().next().unwrap().unwrap_err();
        assert!(error.message.contains("loop"), "{}", error.message);
    }
}
