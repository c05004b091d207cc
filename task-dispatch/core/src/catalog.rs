// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::CatalogError;

/// Ordered, immutable list of tasks: one per regular file directly inside `dir`
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
    tasks: Vec<String>,
}

impl Catalog {
    /// Scans `dir` (no recursion), following symlinks the way `stat` does.
    ///
    /// Entries come back in byte-wise lexicographic order of name. Any failure to
    /// read the directory aborts the scan; dangling symlinks and symlink loops are
    /// not regular files and are skipped.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let mut tasks = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() > 0 && is_broken_link(&err) => {
                    tracing::debug!(error = %err, "Skipping unresolvable entry");
                    continue;
                }
                Err(source) => {
                    return Err(CatalogError::Scan {
                        path: dir.to_path_buf(),
                        source,
                    })
                }
            };

            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let name = name
                .to_str()
                .ok_or_else(|| CatalogError::InvalidName(entry.path().to_path_buf()))?;
            tasks.push(name.to_string());
        }

        tracing::debug!(dir = %dir.display(), tasks = tasks.len(), "Catalog scanned");

        Ok(Self {
            dir: dir.to_path_buf(),
            tasks,
        })
    }

    /// Builds a catalog from an explicit task list, keeping its order
    pub fn from_tasks(dir: impl Into<PathBuf>, tasks: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            tasks,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn is_broken_link(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return true;
    }
    err.io_error()
        .map(|io| io.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_scan_lists_regular_files_in_lexicographic_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.txt", "a.txt", "B.txt", "b.txt", ".hidden"] {
            touch(tmp.path(), name);
        }

        let catalog = Catalog::scan(tmp.path()).unwrap();

        assert_eq!(
            catalog.tasks(),
            &[".hidden", "B.txt", "a.txt", "b.txt", "c.txt"]
        );
        assert!(!catalog.iter().any(|t| t == "." || t == ".."));
    }

    #[test]
    fn test_scan_skips_subdirectories_without_descending() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "top.txt");
        fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested"), "inner.txt");

        let catalog = Catalog::scan(tmp.path()).unwrap();

        assert_eq!(catalog.tasks(), &["top.txt"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::scan(tmp.path()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.dir(), tmp.path());
    }

    #[test]
    fn test_scan_missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = Catalog::scan(&missing).unwrap_err();
        assert!(matches!(err, CatalogError::Scan { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_symlinks_and_skips_dangling_ones() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "real.txt");
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling"))
            .unwrap();

        let catalog = Catalog::scan(tmp.path()).unwrap();

        assert_eq!(catalog.tasks(), &["link.txt", "real.txt"]);
    }

    // Some unix filesystems (APFS) refuse non-UTF-8 names outright
    #[cfg(target_os = "linux")]
    #[test]
    fn test_scan_rejects_non_utf8_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "fine.txt");
        let name = OsStr::from_bytes(b"bad-\xff.txt");
        fs::write(tmp.path().join(name), "").unwrap();

        match Catalog::scan(tmp.path()) {
            Err(CatalogError::InvalidName(path)) => assert_eq!(path, tmp.path().join(name)),
            other => panic!("expected an invalid name error, got {:?}", other),
        }
    }
}
