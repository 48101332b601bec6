use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an analysis run.
///
/// Everything recoverable (unreadable files, parse problems, dangling
/// references, corrupt cache entries) is reported as a
/// [`Diagnostic`](crate::core::Diagnostic) instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("project root {path} is not readable: {reason}")]
    UnreadableRoot { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("tree-sitter grammar error: {0}")]
    Grammar(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache entry for {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
