//! File-system adapter
//!
//! The orchestrator, resolver, and header/code generators never touch
//! `std::fs` directly — they go through this trait so "source" mode
//! (in-memory string → string) and pipeline tests can swap in a mock
//! without touching disk (§5, §9 design notes).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub is_file: bool,
    pub is_dir: bool,
    pub len: u64,
}

pub trait FileSystem {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
    fn mkdir(&self, path: &Path) -> io::Result<()>;
    fn readdir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
    fn stat(&self, path: &Path) -> io::Result<Metadata>;
    /// Removes a single file. Used by the `clean` command to delete
    /// previously generated output; never called on a directory.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Real file-system adapter used by the orchestrator's "files" mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let meta = std::fs::metadata(path)?;
        Ok(Metadata {
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// In-memory file system for "source" mode and pipeline tests. Directories
/// are implicit: a path is a directory if some stored file path has it as a
/// proper ancestor.
#[derive(Debug, Default, Clone)]
pub struct MockFileSystem {
    files: std::cell::RefCell<BTreeMap<PathBuf, String>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        MockFileSystem::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.borrow_mut().insert(path.into(), contents.into());
        self
    }

    pub fn written_files(&self) -> Vec<(PathBuf, String)> {
        self.files.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files.borrow_mut().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.files.borrow().keys().any(|p| p.starts_with(path) && p != path)
    }

    fn mkdir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut seen = std::collections::BTreeSet::new();
        for p in self.files.borrow().keys() {
            if let Ok(rel) = p.strip_prefix(path) {
                if let Some(first) = rel.components().next() {
                    seen.insert(path.join(first.as_os_str()));
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        if let Some(contents) = self.files.borrow().get(path) {
            return Ok(Metadata { is_file: true, is_dir: false, len: contents.len() as u64 });
        }
        if self.is_directory(path) {
            return Ok(Metadata { is_file: false, is_dir: true, len: 0 });
        }
        Err(io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_round_trips_written_files() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/proj/a.cnx"), "void main() {}").unwrap();
        assert!(fs.exists(Path::new("/proj/a.cnx")));
        assert_eq!(fs.read(Path::new("/proj/a.cnx")).unwrap(), "void main() {}");
    }

    #[test]
    fn mock_fs_synthesizes_directories_from_file_paths() {
        let fs = MockFileSystem::new().with_file("/proj/src/a.cnx", "x");
        assert!(fs.is_directory(Path::new("/proj/src")));
        assert!(!fs.is_file(Path::new("/proj/src")));
    }

    #[test]
    fn mock_fs_read_missing_file_errors() {
        let fs = MockFileSystem::new();
        assert!(fs.read(Path::new("/nope")).is_err());
    }

    #[test]
    fn mock_fs_remove_deletes_file() {
        let fs = MockFileSystem::new().with_file("/proj/a.cnx", "x");
        fs.remove(Path::new("/proj/a.cnx")).unwrap();
        assert!(!fs.exists(Path::new("/proj/a.cnx")));
    }

    #[test]
    fn mock_fs_remove_missing_file_errors() {
        let fs = MockFileSystem::new();
        assert!(fs.remove(Path::new("/nope")).is_err());
    }

    #[test]
    fn mock_fs_readdir_lists_immediate_children() {
        let fs = MockFileSystem::new()
            .with_file("/proj/a.cnx", "x")
            .with_file("/proj/sub/b.cnx", "y");
        let entries = fs.readdir(Path::new("/proj")).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
