//! Front-matter extraction and data-document parsing.
//!
//! Markdown content may open with a YAML block fenced by `---` lines; the
//! block moves into the record's config and the remaining text becomes the
//! body. Data files parse wholly into config while their verbatim text is
//! kept as the body. Either way, values are normalized to `serde_json`
//! values so consumers see a single value currency regardless of where the
//! config came from.

use serde_json::Value;
use thiserror::Error;

/// String-keyed configuration mapping attached to resolved records.
pub type ConfigMap = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum MatterError {
    #[error("invalid YAML")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed, but to a scalar or sequence instead of a
    /// string-keyed mapping.
    #[error("document is not a mapping")]
    NotMapping,
}

/// Split a leading front-matter block off `text`.
///
/// Returns the parsed block (when present) and the body that follows it.
/// Text that does not open with a `---` line, or opens one that is never
/// closed, comes back whole with no config.
pub fn split(text: &str) -> Result<(Option<ConfigMap>, String), MatterError> {
    let Some(inner) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok((None, text.to_owned()));
    };
    let Some((block, body)) = split_at_close(inner) else {
        return Ok((None, text.to_owned()));
    };
    Ok((Some(parse_mapping(block)?), body.to_owned()))
}

/// Parse a whole data document into a config mapping.
///
/// Empty and `null` documents yield an empty mapping.
pub fn parse_data(text: &str) -> Result<ConfigMap, MatterError> {
    parse_mapping(text)
}

/// Find the closing `---` line inside an already-opened block.
fn split_at_close(inner: &str) -> Option<(&str, &str)> {
    // An immediate close means an empty block.
    if let Some(body) = inner
        .strip_prefix("---\n")
        .or_else(|| inner.strip_prefix("---\r\n"))
    {
        return Some(("", body));
    }
    if inner == "---" {
        return Some(("", ""));
    }
    for (idx, _) in inner.match_indices("\n---") {
        let after = idx + "\n---".len();
        match inner.as_bytes().get(after) {
            None => return Some((&inner[..idx], "")),
            Some(b'\n') => return Some((&inner[..idx], &inner[after + 1..])),
            Some(b'\r') if inner.as_bytes().get(after + 1) == Some(&b'\n') => {
                return Some((&inner[..idx], &inner[after + 2..]));
            }
            // A longer dash run (for example a `----` rule) is not a close.
            _ => {}
        }
    }
    None
}

fn parse_mapping(text: &str) -> Result<ConfigMap, MatterError> {
    if text.trim().is_empty() {
        return Ok(ConfigMap::new());
    }
    let value: Value = serde_yaml::from_str(text)?;
    match value {
        Value::Null => Ok(ConfigMap::new()),
        Value::Object(map) => Ok(map),
        _ => Err(MatterError::NotMapping),
    }
}
