//! Content resolution for static-site builds.
//!
//! `lode` merges what is on disk with what a build promises to generate,
//! and hands both out as uniform, cached content records. Real files and
//! registered virtual files resolve through one interface, so a template
//! iterating over `posts/*.md` does not care which entries exist yet:
//!
//! ```text
//!          ┌────────────────┐   register("tags", "*.html", make_tag)
//! request ─► SourceTree     ◄──────────────────────────────────────
//!          │   ├─ cache     │   one Arc per path, write-once
//!          │   ├─ registry  │   virtual filenames per directory
//!          │   └─ storage   │   disk or in-memory
//!          └──────┬─────────┘
//!                 ▼
//!          Vec<Arc<Resolved>>  path + generator handle + SourceFile
//! ```
//!
//! Records are materialized by extension: markdown splits front matter
//! into config, data documents parse whole, markup reads verbatim, and
//! everything else defers its single read until first use. Generators are
//! opaque handles; resolution returns them but never invokes them.
//!
//! ```ignore
//! use lode::{SourceTree, TreeConfig};
//!
//! let mut tree = SourceTree::new(TreeConfig::with_root("content"));
//! tree.register("tags", "*.html", make_tag_page);
//!
//! for entry in tree.contents("posts/*.md", true)? {
//!     let title = entry.file.config_value("title");
//!     let body = entry.file.read()?;
//!     // render...
//! }
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod matter;
mod pattern;
pub mod registry;
pub mod storage;
pub mod tree;

pub use config::{ConfigError, TreeConfig};
pub use error::{ResolveError, Result};
pub use file::SourceFile;
pub use matter::ConfigMap;
pub use registry::{GeneratorRegistry, VirtualMatch};
pub use storage::{DiskStorage, MemoryStorage, Storage};
pub use tree::{Resolved, SourceTree};
