//! Source-tree configuration.
//!
//! Controls where content is rooted and how file extensions are classed
//! for materialization. Loadable from TOML:
//!
//! ```toml
//! root = "content"
//! markdown = ["md"]
//! data = ["yaml", "yml"]
//! markup = ["html"]
//! ignore = [".DS_Store"]
//! ```
//!
//! Extension lists hold bare extensions (no leading dot) and are compared
//! case-insensitively. A path like `content/post.MD` is still markdown.

mod defaults;
mod error;

pub use error::ConfigError;

use std::fs;
use std::path::{Path, PathBuf};

use educe::Educe;
use serde::{Deserialize, Serialize};

/// Where requests resolve and which extensions are parsed eagerly.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    /// Content root all relative requests resolve against.
    #[serde(default = "defaults::root")]
    #[educe(Default = defaults::root())]
    pub root: PathBuf,

    /// Extensions read eagerly with front-matter extraction.
    #[serde(default = "defaults::markdown")]
    #[educe(Default = defaults::markdown())]
    pub markdown: Vec<String>,

    /// Extensions parsed whole into config, body kept verbatim.
    #[serde(default = "defaults::data")]
    #[educe(Default = defaults::data())]
    pub data: Vec<String>,

    /// Extensions read eagerly with no config extraction.
    #[serde(default = "defaults::markup")]
    #[educe(Default = defaults::markup())]
    pub markup: Vec<String>,

    /// Entry names skipped while listing directories.
    #[serde(default = "defaults::ignore")]
    #[educe(Default = defaults::ignore())]
    pub ignore: Vec<String>,
}

impl TreeConfig {
    /// Parse a configuration from TOML text.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Default configuration with a different root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn is_markdown(&self, ext: &str) -> bool {
        has_ext(&self.markdown, ext)
    }

    pub fn is_data(&self, ext: &str) -> bool {
        has_ext(&self.data, ext)
    }

    pub fn is_markup(&self, ext: &str) -> bool {
        has_ext(&self.markup, ext)
    }

    /// True when a listed entry name should be skipped entirely.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }

    /// Reject extension lists that overlap or carry dots.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let classes = [
            ("markdown", &self.markdown),
            ("data", &self.data),
            ("markup", &self.markup),
        ];
        for (name, extensions) in &classes {
            for ext in extensions.iter() {
                if ext.is_empty() || ext.contains('.') {
                    return Err(ConfigError::Validation(format!(
                        "`{name}` entries must be bare extensions, got `{ext}`"
                    )));
                }
            }
        }
        for (i, (a_name, a_exts)) in classes.iter().enumerate() {
            for (b_name, b_exts) in classes.iter().skip(i + 1) {
                for ext in a_exts.iter() {
                    if has_ext(b_exts, ext) {
                        return Err(ConfigError::Validation(format!(
                            "`{ext}` is listed under both `{a_name}` and `{b_name}`"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn has_ext(extensions: &[String], ext: &str) -> bool {
    extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
}
