//! Default values for configuration fields.

use std::path::PathBuf;

pub fn root() -> PathBuf {
    PathBuf::from("content")
}

pub fn markdown() -> Vec<String> {
    vec!["md".into()]
}

pub fn data() -> Vec<String> {
    vec!["yaml".into(), "yml".into()]
}

pub fn markup() -> Vec<String> {
    vec!["html".into()]
}

pub fn ignore() -> Vec<String> {
    vec![".DS_Store".into()]
}
