use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ParseIncomplete,
    Ambiguous,
    Unresolved,
    UnreadableFile,
    CacheCorrupt,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::ParseIncomplete => "parse-incomplete",
            DiagnosticKind::Ambiguous => "ambiguous",
            DiagnosticKind::Unresolved => "unresolved",
            DiagnosticKind::UnreadableFile => "unreadable-file",
            DiagnosticKind::CacheCorrupt => "cache-corrupt",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable problem found during analysis. Field order doubles as the
/// sort order of the diagnostics list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    pub file: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            kind,
            message: message.into(),
        }
    }
}
