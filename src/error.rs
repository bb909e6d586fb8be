//! Resolution error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::matter::MatterError;

/// Errors surfaced while resolving content requests.
///
/// Not-found is never an error here: an absent directory resolves to an
/// empty list and a zero-match `get` resolves to `None`.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A request carried glob characters in its directory component.
    /// Only the filename component of a request may be a pattern.
    #[error("glob patterns are not allowed in the directory component: `{0}`")]
    DirectoryPattern(String),

    /// A single-file fetch was given a glob-shaped request.
    #[error("single-file requests must be literal paths, got pattern `{0}`")]
    PatternRequest(String),

    /// A single-file fetch resolved to several records. This indicates a
    /// registration that shadows a real file (or another registration),
    /// never an expected outcome.
    #[error("request `{request}` resolved to {count} records, expected at most one")]
    Ambiguous { request: String, count: usize },

    /// Storage failure, tagged with the path that triggered it.
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    /// A registered or requested glob failed to compile. Patterns are
    /// validated lazily, so this surfaces on first match attempt.
    #[error("invalid glob pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Front matter or a data document failed to parse.
    #[error("malformed front matter in `{0}`")]
    Matter(PathBuf, #[source] MatterError),
}

/// Crate-wide result alias.
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
