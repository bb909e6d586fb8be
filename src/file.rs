//! Content records with one-shot memoized bodies.
//!
//! A [`SourceFile`] is one resolved piece of content, real or virtual.
//! Whether its text is read at construction depends on the extension:
//!
//! | Extension class | Construction            | Config                  | Body          |
//! |-----------------|-------------------------|-------------------------|---------------|
//! | markdown        | eager read              | front-matter block      | text after it |
//! | data            | eager read              | whole parsed document   | verbatim text |
//! | markup          | eager read              | none                    | verbatim text |
//! | anything else   | no read                 | none                    | deferred      |
//!
//! Deferred bodies resolve on the first [`SourceFile::read`] and stay
//! fixed afterwards, even across clones of the surrounding `Arc`:
//!
//! ```text
//! read() ──► Unread ──(storage)──► Resolved(Some(text) | None)
//!                                   │
//! read() ───────────────────────────┴──► cached, no storage call
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::config::TreeConfig;
use crate::error::{ResolveError, Result};
use crate::matter::{self, ConfigMap};
use crate::storage::Storage;

/// Body of a record: nothing until the first read, then fixed.
enum Body {
    Unread,
    /// Directories and other unreadable paths resolve to `None`.
    Resolved(Option<Arc<str>>),
}

/// One piece of content, identified by path, with parsed config and a
/// memoized body.
pub struct SourceFile {
    path: PathBuf,
    directory: PathBuf,
    base_name: CompactString,
    /// Lowercased, without the leading dot. Empty when the path has none.
    extension: CompactString,
    config: Option<ConfigMap>,
    body: Mutex<Body>,
    storage: Arc<dyn Storage>,
    is_virtual: bool,
}

impl SourceFile {
    /// Materialize a record for a real path.
    ///
    /// Extensions classed as markdown, data or markup by `config` are read
    /// and parsed here; every other extension waits for [`read`].
    ///
    /// [`read`]: SourceFile::read
    pub(crate) fn from_disk(
        path: PathBuf,
        config: &TreeConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let (directory, base_name, extension) = name_parts(&path);
        let ext = extension.as_str();

        let (front, body) = if config.is_markdown(ext) {
            let text = read_text(storage.as_ref(), &path)?;
            let (front, rest) = matter::split(&text)
                .map_err(|err| ResolveError::Matter(path.clone(), err))?;
            (front, Body::Resolved(Some(rest.into())))
        } else if config.is_data(ext) {
            let text = read_text(storage.as_ref(), &path)?;
            let parsed = matter::parse_data(&text)
                .map_err(|err| ResolveError::Matter(path.clone(), err))?;
            (Some(parsed), Body::Resolved(Some(text.into())))
        } else if config.is_markup(ext) {
            let text = read_text(storage.as_ref(), &path)?;
            (None, Body::Resolved(Some(text.into())))
        } else {
            (None, Body::Unread)
        };

        Ok(Self {
            path,
            directory,
            base_name,
            extension,
            config: front,
            body: Mutex::new(body),
            storage,
            is_virtual: false,
        })
    }

    /// Record for a virtual path. Never touches storage at construction;
    /// the body stays deferred regardless of extension.
    pub(crate) fn for_virtual(path: PathBuf, storage: Arc<dyn Storage>) -> Self {
        Self::deferred(path, storage, true)
    }

    /// Record for a real directory. Directories bypass extension classing
    /// (a directory named `drafts.md` is not markdown), so the body is
    /// deferred and resolves to `None`.
    pub(crate) fn for_directory(path: PathBuf, storage: Arc<dyn Storage>) -> Self {
        Self::deferred(path, storage, false)
    }

    fn deferred(path: PathBuf, storage: Arc<dyn Storage>, is_virtual: bool) -> Self {
        let (directory, base_name, extension) = name_parts(&path);
        Self {
            path,
            directory,
            base_name,
            extension,
            config: None,
            body: Mutex::new(Body::Unread),
            storage,
            is_virtual,
        }
    }

    /// The record's text, reading it on the first call.
    ///
    /// Directories yield `None`. The lock is held across the first read, so
    /// concurrent callers block instead of issuing duplicate reads; a failed
    /// read is not memoized and the next call retries.
    pub fn read(&self) -> Result<Option<Arc<str>>> {
        let mut body = self.body.lock();
        if let Body::Resolved(text) = &*body {
            return Ok(text.clone());
        }

        trace!(path = %self.path.display(), "reading deferred body");
        let is_dir = self
            .storage
            .is_dir(&self.path)
            .map_err(|err| ResolveError::Io(self.path.clone(), err))?;
        if is_dir {
            *body = Body::Resolved(None);
            return Ok(None);
        }
        let text: Arc<str> = read_text(self.storage.as_ref(), &self.path)?.into();
        *body = Body::Resolved(Some(text.clone()));
        Ok(Some(text))
    }

    /// Absolute normalized path identifying this record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory component of [`path`](SourceFile::path).
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Final path component, extension included.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Lowercased extension without the dot, or `""`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Parsed front matter or data document, when the extension carries one.
    pub fn config(&self) -> Option<&ConfigMap> {
        self.config.as_ref()
    }

    /// Convenience lookup into [`config`](SourceFile::config).
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.as_ref()?.get(key)
    }

    /// True when this record came from a generator registration rather
    /// than a listed entry.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &*self.body.lock() {
            Body::Unread => "unread",
            Body::Resolved(Some(_)) => "text",
            Body::Resolved(None) => "none",
        };
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("body", &body)
            .field("is_virtual", &self.is_virtual)
            .finish()
    }
}

fn read_text(storage: &dyn Storage, path: &Path) -> Result<String> {
    storage
        .read_text(path)
        .map_err(|err| ResolveError::Io(path.to_path_buf(), err))
}

fn name_parts(path: &Path) -> (PathBuf, CompactString, CompactString) {
    let directory = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
    let base_name = path
        .file_name()
        .map_or_else(CompactString::default, |name| {
            CompactString::new(name.to_string_lossy())
        });
    let extension = path
        .extension()
        .map_or_else(CompactString::default, |ext| {
            CompactString::new(ext.to_string_lossy().to_ascii_lowercase())
        });
    (directory, base_name, extension)
}
