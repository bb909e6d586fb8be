//! Storage provider boundary.
//!
//! Resolution only talks to storage through the narrow [`Storage`]
//! contract: directory checks, immediate listings, and whole-file text
//! reads. [`DiskStorage`] is the production implementation over
//! `std::fs`. [`MemoryStorage`] keeps a tree in memory and counts every
//! call, which keeps "reads at most once" and "no IO for glob fetches"
//! observable in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{fmt, fs};

use parking_lot::RwLock;

/// Narrow storage contract the resolver is written against.
pub trait Storage: Send + Sync {
    /// True when `path` names an existing directory. Plain files and
    /// missing paths are both `false`, not errors.
    fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Immediate entry names of `dir`, sorted ascending.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Full text content of the file at `path`.
    fn read_text(&self, path: &Path) -> io::Result<String>;
}

// ============================================================================
// Disk
// ============================================================================

/// `std::fs`-backed storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStorage;

impl Storage for DiskStorage {
    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            // Non-UTF-8 names cannot be addressed by requests anyway.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-memory storage for tests and hermetic runs.
///
/// Directories exist implicitly for every ancestor of an inserted file,
/// or explicitly through [`MemoryStorage::add_dir`].
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<PathBuf, String>>,
    dirs: RwLock<BTreeSet<PathBuf>>,
    stat_calls: AtomicUsize,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, creating its ancestor directories.
    pub fn add_file(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        let path = path.into();
        self.add_ancestors(&path);
        self.files.write().insert(path, text.into());
    }

    /// Insert an (empty) directory, creating its ancestors.
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.add_ancestors(&path);
        self.dirs.write().insert(path);
    }

    fn add_ancestors(&self, path: &Path) {
        let mut dirs = self.dirs.write();
        for parent in path.ancestors().skip(1) {
            if !parent.as_os_str().is_empty() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }

    /// Number of `is_dir` calls served.
    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::Relaxed)
    }

    /// Number of `list` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `read_text` calls served.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Total storage calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.stat_calls() + self.list_calls() + self.read_calls()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("files", &self.files.read().len())
            .field("dirs", &self.dirs.read().len())
            .finish()
    }
}

impl Storage for MemoryStorage {
    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        self.stat_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.dirs.read().contains(path))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        if !self.dirs.read().contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            ));
        }
        let mut names = BTreeSet::new();
        for path in self.files.read().keys().chain(self.dirs.read().iter()) {
            if path.parent() != Some(dir) {
                continue;
            }
            if let Some(name) = path.file_name() {
                names.insert(name.to_string_lossy().into_owned());
            }
        }
        Ok(names.into_iter().collect())
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        match self.files.read().get(path) {
            Some(text) => Ok(text.clone()),
            None if self.dirs.read().contains(path) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }
}
