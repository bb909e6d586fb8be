//! Path resolution over real and virtual content.
//!
//! [`SourceTree`] is the crate's entry point. It owns the resolution
//! cache and the generator registry, and turns path or glob requests into
//! shared [`Resolved`] entries:
//!
//! ```text
//! contents("posts/*.md", recurse)
//!     │
//!     ▼
//! queue: [<root>/posts]
//!     │  per directory:
//!     │    ├─ list real entries, filter by the name pattern
//!     │    │    ├─ subdirectory + recurse ──► push onto the queue
//!     │    │    ├─ subdirectory           ──► directory record
//!     │    │    └─ file                   ──► materialized record
//!     │    └─ registry matches for the directory ──► virtual records
//!     ▼
//! Vec<Arc<Resolved>>      one cache entry per path, first insert wins
//! ```
//!
//! The name pattern applies only at the requested level; directories
//! dequeued below it are scanned with `*`. Directories that do not exist
//! contribute nothing, virtual matches included, so a missing root
//! resolves to an empty list rather than an error.
//!
//! The cache is per-instance and write-once: a path resolves to the same
//! `Arc` for the lifetime of the tree, no matter how it is reached.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::TreeConfig;
use crate::error::{ResolveError, Result};
use crate::file::SourceFile;
use crate::pattern::{self, WILDCARD};
use crate::registry::GeneratorRegistry;
use crate::storage::{DiskStorage, Storage};

/// One resolved entry: a path, the generator handle when the entry is
/// virtual, and the content record itself.
#[derive(Debug)]
pub struct Resolved<G> {
    pub path: PathBuf,
    pub generator: Option<G>,
    pub file: SourceFile,
}

/// A content root with its registrations and resolution cache.
pub struct SourceTree<G> {
    config: TreeConfig,
    root: PathBuf,
    storage: Arc<dyn Storage>,
    generators: GeneratorRegistry<G>,
    cache: RwLock<FxHashMap<PathBuf, Arc<Resolved<G>>>>,
}

impl<G> SourceTree<G> {
    /// Tree over the local filesystem.
    pub fn new(config: TreeConfig) -> Self {
        Self::with_storage(config, Arc::new(DiskStorage))
    }

    /// Tree over a caller-provided storage implementation.
    pub fn with_storage(config: TreeConfig, storage: Arc<dyn Storage>) -> Self {
        let root = normalize(&config.root);
        Self {
            config,
            root,
            storage,
            generators: GeneratorRegistry::new(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a virtual file for every directory matching
    /// `directory_glob`. See [`GeneratorRegistry::register`].
    pub fn register(
        &mut self,
        directory_glob: impl Into<String>,
        name_glob: impl Into<String>,
        generator: G,
    ) {
        self.generators.register(directory_glob, name_glob, generator);
    }

    pub fn registry(&self) -> &GeneratorRegistry<G> {
        &self.generators
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Normalized content root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of distinct paths resolved so far.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl<G: Clone> SourceTree<G> {
    /// Resolve a request to all matching entries.
    ///
    /// A request naming an existing directory lists that directory; any
    /// other request is split into a literal directory and a final name
    /// component, which may be a glob. With `recurse`, matched
    /// subdirectories are descended into; without it they appear as
    /// records of their own.
    pub fn contents(
        &self,
        request: impl AsRef<Path>,
        recurse: bool,
    ) -> Result<Vec<Arc<Resolved<G>>>> {
        let target = self.absolute(request.as_ref());
        let target_is_dir = self
            .storage
            .is_dir(&target)
            .map_err(|err| ResolveError::Io(target.clone(), err))?;

        let (start, name_pattern) = if target_is_dir {
            (target, WILDCARD.to_owned())
        } else {
            let dir = target.parent().map_or_else(PathBuf::new, Path::to_path_buf);
            let dir_text = dir.to_string_lossy();
            if pattern::is_pattern(&dir_text) {
                return Err(ResolveError::DirectoryPattern(dir_text.into_owned()));
            }
            let name = target.file_name().map_or_else(
                || WILDCARD.to_owned(),
                |name| name.to_string_lossy().into_owned(),
            );
            (dir, name)
        };
        debug!(dir = %start.display(), pattern = %name_pattern, recurse, "resolving contents");

        let mut results = Vec::new();
        let mut queue = VecDeque::from([start]);
        let mut active = name_pattern;
        while let Some(dir) = queue.pop_front() {
            self.scan_directory(&dir, &active, recurse, &mut queue, &mut results)?;
            // The name filter applies only at the requested level.
            if active != WILDCARD {
                active = WILDCARD.to_owned();
            }
        }
        Ok(results)
    }

    /// Resolve a literal request to at most one entry.
    ///
    /// Glob-shaped requests are rejected before any storage call. More
    /// than one match (a registration shadowing a real file, or two
    /// registrations offering the same name) is an error, not a pick.
    pub fn get(&self, request: impl AsRef<Path>) -> Result<Option<Arc<Resolved<G>>>> {
        let request = request.as_ref();
        let text = request.to_string_lossy();
        if pattern::is_pattern(&text) {
            return Err(ResolveError::PatternRequest(text.into_owned()));
        }
        let mut entries = self.contents(request, false)?;
        match entries.len() {
            0 => Ok(None),
            1 => Ok(entries.pop()),
            count => Err(ResolveError::Ambiguous {
                request: text.into_owned(),
                count,
            }),
        }
    }

    /// Resolve one directory level: real entries first, then whatever the
    /// registry offers for it. Missing directories contribute nothing.
    fn scan_directory(
        &self,
        dir: &Path,
        name_pattern: &str,
        recurse: bool,
        queue: &mut VecDeque<PathBuf>,
        results: &mut Vec<Arc<Resolved<G>>>,
    ) -> Result<()> {
        let exists = self
            .storage
            .is_dir(dir)
            .map_err(|err| ResolveError::Io(dir.to_path_buf(), err))?;
        if !exists {
            return Ok(());
        }

        let listed = self
            .storage
            .list(dir)
            .map_err(|err| ResolveError::Io(dir.to_path_buf(), err))?;
        let visible = listed
            .into_iter()
            .filter(|name| !self.config.is_ignored(name))
            .collect();
        for name in pattern::filter(visible, name_pattern)? {
            let path = dir.join(&name);
            let is_dir = self
                .storage
                .is_dir(&path)
                .map_err(|err| ResolveError::Io(path.clone(), err))?;
            if is_dir {
                if recurse {
                    trace!(path = %path.display(), "descending");
                    queue.push_back(path);
                } else {
                    results.push(self.directory_entry(path)?);
                }
            } else {
                results.push(self.file_entry(path)?);
            }
        }

        if let Some(relative) = self.registry_dir(dir) {
            for matched in self.generators.virtual_matches(&relative, name_pattern)? {
                let path = dir.join(matched.name.as_str());
                results.push(self.virtual_entry(path, matched.generator)?);
            }
        }
        Ok(())
    }

    fn file_entry(&self, path: PathBuf) -> Result<Arc<Resolved<G>>> {
        if let Some(hit) = self.cache.read().get(&path) {
            return Ok(hit.clone());
        }
        let file = SourceFile::from_disk(path.clone(), &self.config, self.storage.clone())?;
        let entry = Arc::new(Resolved {
            path: path.clone(),
            generator: None,
            file,
        });
        Ok(self.insert(path, entry))
    }

    fn directory_entry(&self, path: PathBuf) -> Result<Arc<Resolved<G>>> {
        if let Some(hit) = self.cache.read().get(&path) {
            return Ok(hit.clone());
        }
        let file = SourceFile::for_directory(path.clone(), self.storage.clone());
        let entry = Arc::new(Resolved {
            path: path.clone(),
            generator: None,
            file,
        });
        Ok(self.insert(path, entry))
    }

    fn virtual_entry(&self, path: PathBuf, generator: G) -> Result<Arc<Resolved<G>>> {
        if let Some(hit) = self.cache.read().get(&path) {
            return Ok(hit.clone());
        }
        let file = SourceFile::for_virtual(path.clone(), self.storage.clone());
        let entry = Arc::new(Resolved {
            path: path.clone(),
            generator: Some(generator),
            file,
        });
        Ok(self.insert(path, entry))
    }

    /// First insert wins; later callers get whatever is already cached.
    fn insert(&self, path: PathBuf, entry: Arc<Resolved<G>>) -> Arc<Resolved<G>> {
        self.cache.write().entry(path).or_insert(entry).clone()
    }

    /// Render `dir` root-relative for registry matching, `.` for the root
    /// itself. Directories outside the root have no registry namespace.
    fn registry_dir(&self, dir: &Path) -> Option<String> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let text = relative.to_string_lossy().replace('\\', "/");
        Some(if text.is_empty() { ".".to_owned() } else { text })
    }

    fn absolute(&self, request: &Path) -> PathBuf {
        // join() replaces the base when the request is already absolute.
        normalize(&self.root.join(request))
    }
}

/// Lexical normalization: `.` segments drop, `..` segments consume the
/// preceding name. Nothing touches storage and symlinks stay opaque, so
/// cache identity is purely textual.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(Component::ParentDir),
            },
            _ => out.push(component),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn memory_site() -> Arc<MemoryStorage> {
        let mem = Arc::new(MemoryStorage::new());
        mem.add_dir("/site");
        mem
    }

    fn tree_over(mem: &Arc<MemoryStorage>) -> SourceTree<&'static str> {
        SourceTree::with_storage(TreeConfig::with_root("/site"), mem.clone())
    }

    fn paths<G>(entries: &[Arc<Resolved<G>>]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| entry.path.display().to_string())
            .collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/b/../../c")), PathBuf::from("c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("./a")), PathBuf::from("a"));
    }

    #[test]
    fn test_list_directory_with_mixed_extensions() {
        let mem = memory_site();
        mem.add_file("/site/post.md", "---\ntitle: One\n---\nbody\n");
        mem.add_file("/site/site.yaml", "name: demo\n");
        mem.add_file("/site/raw.txt", "bytes");

        let tree = tree_over(&mem);
        let entries = tree.contents(".", false).unwrap();
        assert_eq!(
            paths(&entries),
            vec!["/site/post.md", "/site/raw.txt", "/site/site.yaml"]
        );

        let post = &entries[0];
        assert_eq!(post.file.config_value("title"), Some(&json!("One")));
        assert_eq!(post.file.read().unwrap().as_deref(), Some("body\n"));
        assert!(post.generator.is_none());
    }

    #[test]
    fn test_exact_file_request() {
        let mem = memory_site();
        mem.add_file("/site/notes/a.md", "alpha\n");
        mem.add_file("/site/notes/b.md", "beta\n");

        let tree = tree_over(&mem);
        let entries = tree.contents("notes/a.md", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/notes/a.md"]);
    }

    #[test]
    fn test_name_glob_filters_requested_level() {
        let mem = memory_site();
        mem.add_file("/site/a.md", "");
        mem.add_file("/site/b.md", "");
        mem.add_file("/site/c.txt", "");

        let tree = tree_over(&mem);
        let entries = tree.contents("*.md", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/a.md", "/site/b.md"]);
    }

    #[test]
    fn test_recurse_descends_and_resets_pattern() {
        let mem = memory_site();
        mem.add_file("/site/a/b1.md", "");
        mem.add_file("/site/a/c.md", "");
        mem.add_file("/site/a/bsub/inner.txt", "");

        let tree = tree_over(&mem);
        // `b*` keeps b1.md and the bsub directory; inside bsub the filter
        // is gone, so inner.txt appears even though it never matched `b*`.
        let entries = tree.contents("a/b*", true).unwrap();
        assert_eq!(
            paths(&entries),
            vec!["/site/a/b1.md", "/site/a/bsub/inner.txt"]
        );
    }

    #[test]
    fn test_breadth_first_order() {
        let mem = memory_site();
        mem.add_file("/site/top.md", "");
        mem.add_file("/site/a/one.md", "");
        mem.add_file("/site/a/deep/two.md", "");
        mem.add_file("/site/b/three.md", "");

        let tree = tree_over(&mem);
        let entries = tree.contents(".", true).unwrap();
        assert_eq!(
            paths(&entries),
            vec![
                "/site/top.md",
                "/site/a/one.md",
                "/site/b/three.md",
                "/site/a/deep/two.md"
            ]
        );
    }

    #[test]
    fn test_directories_become_records_without_recurse() {
        let mem = memory_site();
        mem.add_file("/site/sub/inner.md", "");
        mem.add_file("/site/top.md", "");

        let tree = tree_over(&mem);
        let entries = tree.contents(".", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/sub", "/site/top.md"]);
        // The directory record resolves to a null body.
        assert_eq!(entries[0].file.read().unwrap(), None);
    }

    #[test]
    fn test_directory_record_skips_extension_classes() {
        let mem = memory_site();
        mem.add_file("/site/drafts.md/inner.txt", "x");

        let tree = tree_over(&mem);
        let entries = tree.contents(".", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/drafts.md"]);
        assert!(entries[0].file.config().is_none());
        assert_eq!(entries[0].file.read().unwrap(), None);
    }

    #[test]
    fn test_missing_directory_is_empty_not_an_error() {
        let mem = memory_site();
        let tree = tree_over(&mem);

        assert!(tree.contents("missing", false).unwrap().is_empty());
        assert!(tree.contents("missing/*.md", true).unwrap().is_empty());
        assert!(tree.get("missing/a.md").unwrap().is_none());
    }

    #[test]
    fn test_ignored_names_are_invisible() {
        let mem = memory_site();
        mem.add_file("/site/.DS_Store", "junk");
        mem.add_file("/site/kept.md", "");

        let tree = tree_over(&mem);
        let entries = tree.contents(".", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/kept.md"]);
    }

    #[test]
    fn test_directory_component_glob_is_rejected() {
        let mem = memory_site();
        let tree = tree_over(&mem);

        let err = tree.contents("po*/x.md", false).unwrap_err();
        assert!(matches!(err, ResolveError::DirectoryPattern(_)));
    }

    #[test]
    fn test_get_rejects_patterns_without_storage_calls() {
        let mem = memory_site();
        let tree = tree_over(&mem);

        let err = tree.get("*.md").unwrap_err();
        assert!(matches!(err, ResolveError::PatternRequest(_)));
        assert_eq!(mem.total_calls(), 0);
    }

    #[test]
    fn test_cache_returns_identical_arcs() {
        let mem = memory_site();
        mem.add_file("/site/a.md", "body");

        let tree = tree_over(&mem);
        let first = tree.get("a.md").unwrap().unwrap();
        let second = tree.get("a.md").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tree.cached_len(), 1);

        // The same path reached through a listing is still the same entry.
        let listed = tree.contents(".", false).unwrap();
        assert!(Arc::ptr_eq(&first, &listed[0]));
    }

    #[test]
    fn test_cache_keys_are_normalized() {
        let mem = memory_site();
        mem.add_file("/site/notes/a.md", "");

        let tree = tree_over(&mem);
        let plain = tree.get("notes/a.md").unwrap().unwrap();
        let dotted = tree.get("./notes/../notes/a.md").unwrap().unwrap();
        assert!(Arc::ptr_eq(&plain, &dotted));
        assert_eq!(tree.cached_len(), 1);
    }

    #[test]
    fn test_eager_files_read_once_across_requests() {
        let mem = memory_site();
        mem.add_file("/site/a.md", "---\nx: 1\n---\n");

        let tree = tree_over(&mem);
        let _ = tree.contents(".", false).unwrap();
        let _ = tree.contents(".", false).unwrap();
        let _ = tree.get("a.md").unwrap();
        assert_eq!(mem.read_calls(), 1);
    }

    #[test]
    fn test_lazy_body_reads_once_across_handles() {
        let mem = memory_site();
        mem.add_file("/site/data.txt", "payload");

        let tree = tree_over(&mem);
        let a = tree.get("data.txt").unwrap().unwrap();
        let b = tree.get("data.txt").unwrap().unwrap();
        assert_eq!(mem.read_calls(), 0);

        let _ = a.file.read().unwrap();
        let _ = b.file.read().unwrap();
        assert_eq!(mem.read_calls(), 1);
    }

    #[test]
    fn test_virtual_entry_for_explicit_request() {
        let mem = memory_site();
        mem.add_dir("/site/tags");

        let mut tree = tree_over(&mem);
        tree.register("tags", "*.html", "tag-page");

        let entry = tree.get("tags/rust.html").unwrap().unwrap();
        assert_eq!(entry.path, PathBuf::from("/site/tags/rust.html"));
        assert_eq!(entry.generator, Some("tag-page"));
        assert!(entry.file.is_virtual());

        // Broad listing of the same directory offers nothing for the
        // glob-named registration, but the explicit entry is now cached
        // and stays reachable by name.
        assert!(tree.contents("tags", false).unwrap().is_empty());
        let again = tree.get("tags/rust.html").unwrap().unwrap();
        assert!(Arc::ptr_eq(&entry, &again));
    }

    #[test]
    fn test_virtual_entry_offered_to_listing() {
        let mem = memory_site();
        mem.add_file("/site/pages/foo/real.md", "");
        mem.add_dir("/site/pages/bar");

        let mut tree = tree_over(&mem);
        tree.register("pages/*", "index.html", "section-index");

        let foo = tree.contents("pages/foo", false).unwrap();
        assert_eq!(
            paths(&foo),
            vec!["/site/pages/foo/real.md", "/site/pages/foo/index.html"]
        );
        let bar = tree.contents("pages/bar", false).unwrap();
        assert_eq!(paths(&bar), vec!["/site/pages/bar/index.html"]);
        // The parent itself is out of the registration's scope.
        let parent = tree.contents("pages", true).unwrap();
        assert_eq!(
            paths(&parent),
            vec![
                "/site/pages/bar/index.html",
                "/site/pages/foo/real.md",
                "/site/pages/foo/index.html"
            ]
        );
    }

    #[test]
    fn test_virtual_requires_existing_directory() {
        let mem = memory_site();
        let mut tree = tree_over(&mem);
        tree.register("ghost", "index.html", "never");

        assert!(tree.contents("ghost", false).unwrap().is_empty());
        assert!(tree.get("ghost/index.html").unwrap().is_none());
    }

    #[test]
    fn test_root_registration_uses_dot() {
        let mem = memory_site();
        mem.add_file("/site/page.md", "");

        let mut tree = tree_over(&mem);
        tree.register(".", "feed.xml", "feed");

        let entries = tree.contents(".", false).unwrap();
        assert_eq!(paths(&entries), vec!["/site/page.md", "/site/feed.xml"]);
    }

    #[test]
    fn test_escaping_root_skips_registry() {
        let mem = memory_site();
        mem.add_file("/outside/file.md", "");
        mem.add_file("/site/here.md", "");

        let mut tree = tree_over(&mem);
        tree.register("*", "index.html", "everywhere");

        let outside = tree.contents("/outside", false).unwrap();
        assert_eq!(paths(&outside), vec!["/outside/file.md"]);
        let inside = tree.contents(".", false).unwrap();
        assert_eq!(
            paths(&inside),
            vec!["/site/here.md", "/site/index.html"]
        );
    }

    #[test]
    fn test_get_ambiguous_when_virtual_shadows_real() {
        let mem = memory_site();
        mem.add_file("/site/pages/index.html", "<p>real</p>");

        let mut tree = tree_over(&mem);
        tree.register("pages", "index.html", "generated");

        let err = tree.get("pages/index.html").unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));

        // Both appearances are the same cache entry, and the first
        // materialization (the real file) won it.
        let entries = tree.contents("pages/index.html", false).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(Arc::ptr_eq(&entries[0], &entries[1]));
        assert!(!entries[0].file.is_virtual());
        assert_eq!(entries[0].generator, None);
    }

    #[test]
    fn test_get_missing_is_none() {
        let mem = memory_site();
        mem.add_file("/site/a.md", "");

        let tree = tree_over(&mem);
        assert!(tree.get("b.md").unwrap().is_none());
    }

    #[test]
    fn test_generator_handles_are_returned_not_called() {
        type PageGenerator = fn() -> String;
        fn about_page() -> String {
            "<h1>about</h1>".to_owned()
        }

        let mem = memory_site();
        mem.add_dir("/site/pages");

        let mut tree: SourceTree<PageGenerator> =
            SourceTree::with_storage(TreeConfig::with_root("/site"), mem.clone());
        tree.register("pages", "about.html", about_page as PageGenerator);

        let reads_before = mem.read_calls();
        let entry = tree.get("pages/about.html").unwrap().unwrap();
        // Resolution never ran the generator or touched the virtual path.
        assert_eq!(mem.read_calls(), reads_before);

        let produce = entry.generator.expect("virtual entry carries its handle");
        assert_eq!(produce(), "<h1>about</h1>");
    }

    #[test]
    fn test_shared_across_threads() {
        let mem = memory_site();
        mem.add_file("/site/a.txt", "payload");

        let tree = tree_over(&mem);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let entry = tree.get("a.txt").unwrap().unwrap();
                    assert_eq!(entry.file.read().unwrap().as_deref(), Some("payload"));
                });
            }
        });
        assert_eq!(tree.cached_len(), 1);
        assert_eq!(mem.read_calls(), 1);
    }

    #[test]
    fn test_disk_backed_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("content");
        fs::create_dir_all(root.join("posts")).unwrap();
        fs::write(root.join("posts/hello.md"), "---\ntitle: Hello\n---\nHi\n").unwrap();
        fs::write(root.join("site.yaml"), "lang: en\n").unwrap();

        let mut tree: SourceTree<&str> = SourceTree::new(TreeConfig::with_root(&root));
        tree.register("posts", "archive.html", "archive");

        let entries = tree.contents(".", true).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|entry| entry.file.base_name().to_owned())
            .collect();
        assert_eq!(names, vec!["site.yaml", "hello.md", "archive.html"]);

        let post = tree.get("posts/hello.md").unwrap().unwrap();
        assert_eq!(post.file.config_value("title"), Some(&json!("Hello")));
        assert_eq!(post.file.read().unwrap().as_deref(), Some("Hi\n"));
    }
}
