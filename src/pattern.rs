//! Glob matching for requests and registrations.
//!
//! All matching goes through `globset` with `literal_separator` enabled,
//! so `*` stays inside one path segment and never crosses `/`. Literal
//! (glob-free) text short-circuits to plain equality without compiling
//! anything. Compiled matchers are memoized process-wide because the same
//! handful of patterns is re-applied at every directory level of every
//! request.

use std::sync::LazyLock;

use globset::{GlobBuilder, GlobMatcher};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{ResolveError, Result};

/// The match-everything pattern applied below the requested root.
pub const WILDCARD: &str = "*";

/// Characters that make a piece of text glob-shaped.
const PATTERN_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

static COMPILED: LazyLock<RwLock<FxHashMap<String, GlobMatcher>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// True when `text` contains any glob metacharacter.
pub fn is_pattern(text: &str) -> bool {
    text.contains(PATTERN_CHARS)
}

/// Match `candidate` against `pattern`.
///
/// Glob-free patterns compare by equality. Invalid glob syntax surfaces
/// here as [`ResolveError::Pattern`], not at registration time.
pub fn matches(candidate: &str, pattern: &str) -> Result<bool> {
    if !is_pattern(pattern) {
        return Ok(candidate == pattern);
    }
    if let Some(matcher) = COMPILED.read().get(pattern) {
        return Ok(matcher.is_match(candidate));
    }
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| ResolveError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?
        .compile_matcher();
    let hit = matcher.is_match(candidate);
    COMPILED.write().insert(pattern.to_owned(), matcher);
    Ok(hit)
}

/// Keep the names matching `pattern`, preserving their order.
pub fn filter(names: Vec<String>, pattern: &str) -> Result<Vec<String>> {
    if pattern == WILDCARD {
        return Ok(names);
    }
    let mut kept = Vec::with_capacity(names.len());
    for name in names {
        if matches(&name, pattern)? {
            kept.push(name);
        }
    }
    Ok(kept)
}
