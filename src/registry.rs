//! Virtual-file registrations and the policy that exposes them.
//!
//! A registration is a `(directory glob, name glob, generator)` triple.
//! Directory globs are matched against root-relative directories (`.` is
//! the root itself), so `"pages"` covers one directory while `"pages/*"`
//! covers each of its children. Generators are opaque handles: nothing
//! here calls them, they ride along on matches for the caller to invoke.
//!
//! Name matching is deliberately asymmetric. An explicit request can
//! reach any registration whose name glob matches it, including globbed
//! ones. A broad listing only surfaces registrations whose name is a
//! concrete literal, because a globbed name has no single filename to
//! offer and would otherwise inject an unbounded family of entries into
//! every listing it touches.
//!
//! | Registered name | Requested name | Offered           |
//! |-----------------|----------------|-------------------|
//! | literal         | literal        | requested name    |
//! | literal         | glob           | registered name   |
//! | glob            | literal        | requested name    |
//! | glob            | glob           | nothing           |

use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::Result;
use crate::pattern;

/// One registered virtual-file producer.
#[derive(Debug, Clone)]
struct Registration<G> {
    directory_glob: String,
    name_glob: String,
    generator: G,
}

/// A virtual filename offered for a directory, with the generator handle
/// that was registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMatch<G> {
    pub name: CompactString,
    pub generator: G,
}

/// Ordered set of virtual-file registrations.
#[derive(Debug, Clone)]
pub struct GeneratorRegistry<G> {
    registrations: Vec<Registration<G>>,
}

impl<G> GeneratorRegistry<G> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Register a generator for `name_glob` under every directory matching
    /// `directory_glob`. Globs are validated lazily, on first match.
    pub fn register(
        &mut self,
        directory_glob: impl Into<String>,
        name_glob: impl Into<String>,
        generator: G,
    ) {
        self.registrations.push(Registration {
            directory_glob: directory_glob.into(),
            name_glob: name_glob.into(),
            generator,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl<G: Clone> GeneratorRegistry<G> {
    /// Virtual filenames offered for `directory` (root-relative, `.` for
    /// the root) against `name_pattern`, in registration order.
    ///
    /// Two registrations may offer the same filename; callers see both.
    pub fn virtual_matches(
        &self,
        directory: &str,
        name_pattern: &str,
    ) -> Result<SmallVec<[VirtualMatch<G>; 2]>> {
        let mut matches = SmallVec::new();
        for registration in &self.registrations {
            if !pattern::matches(directory, &registration.directory_glob)? {
                continue;
            }
            if let Some(name) = offer(&registration.name_glob, name_pattern)? {
                matches.push(VirtualMatch {
                    name,
                    generator: registration.generator.clone(),
                });
            }
        }
        if !matches.is_empty() {
            trace!(directory, name_pattern, count = matches.len(), "virtual matches");
        }
        Ok(matches)
    }
}

impl<G> Default for GeneratorRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide whether a registered name glob offers a filename for the
/// requested name pattern, and which filename that is.
fn offer(name_glob: &str, name_pattern: &str) -> Result<Option<CompactString>> {
    if !pattern::is_pattern(name_pattern) {
        // Explicit request: the request itself names the file.
        return Ok(pattern::matches(name_pattern, name_glob)?
            .then(|| CompactString::new(name_pattern)));
    }
    if pattern::is_pattern(name_glob) {
        // Broad listing against a globbed registration: nothing concrete
        // to offer.
        return Ok(None);
    }
    // Broad listing against a literal registration: the registered name
    // is the file, provided the request's pattern covers it.
    Ok(pattern::matches(name_glob, name_pattern)?.then(|| CompactString::new(name_glob)))
}
