use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::EntityKind;
use crate::config::PathRules;

/// Structural category of a project file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    Model,
    Route,
    Handler,
    Serializer,
    Migration,
    Other,
}

impl FileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FileRole::Model => "model",
            FileRole::Route => "route",
            FileRole::Handler => "handler",
            FileRole::Serializer => "serializer",
            FileRole::Migration => "migration",
            FileRole::Other => "other",
        }
    }

    pub fn entity_kind(self) -> EntityKind {
        match self {
            FileRole::Model => EntityKind::Model,
            FileRole::Route => EntityKind::Route,
            FileRole::Handler => EntityKind::Handler,
            FileRole::Serializer => EntityKind::Serializer,
            FileRole::Migration => EntityKind::Migration,
            FileRole::Other => EntityKind::Other,
        }
    }

    pub fn is_extractable(self) -> bool {
        self != FileRole::Other
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content markers that identify each role regardless of file name.
struct Signatures {
    model: Vec<Regex>,
    route: Vec<Regex>,
    handler: Vec<Regex>,
    serializer: Vec<Regex>,
    migration: Vec<Regex>,
}

impl Signatures {
    fn compile() -> Self {
        fn patterns(sources: &[&str]) -> Vec<Regex> {
            sources
                .iter()
                .filter_map(|source| Regex::new(source).ok())
                .collect()
        }

        Self {
            model: patterns(&[
                r"(?m)^class\s+\w+\s*\([^)]*\b(?:models\.Model|Model)\s*[,)]",
                r"(?m)^\s+\w+\s*=\s*models\.\w*(?:Field|ForeignKey)\s*\(",
            ]),
            route: patterns(&[
                r"(?m)^urlpatterns\s*\+?=",
                r"(?m)^\s*\w*router\.register\s*\(",
            ]),
            handler: patterns(&[
                r"(?m)^(?:async\s+)?def\s+\w+\s*\(\s*request\b",
                r"(?m)^class\s+\w+\s*\([^)]*(?:View|ViewSet)\s*[,)]",
            ]),
            serializer: patterns(&[r"(?m)^class\s+\w+\s*\([^)]*Serializer\s*[,)]"]),
            migration: patterns(&[r"(?m)^class\s+Migration\s*\(\s*migrations\.Migration\s*\)"]),
        }
    }
}

fn any_match(patterns: &[Regex], content: &str) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(content))
}

/// Assigns roles to files from their path and content.
///
/// Classification is a pure function of its inputs: the same path and
/// content always produce the same sorted role set.
pub struct FileClassifier {
    signatures: Signatures,
    rules: PathRules,
}

impl FileClassifier {
    pub fn new() -> Self {
        Self::with_rules(PathRules::default())
    }

    pub fn with_rules(rules: PathRules) -> Self {
        Self {
            signatures: Signatures::compile(),
            rules,
        }
    }

    /// `path` is relative to the project root and uses `/` separators.
    pub fn classify(&self, path: &str, content: &str) -> Vec<FileRole> {
        if let Some(roles) = self.rules.override_roles(path) {
            return normalize(roles.to_vec());
        }

        if !path.ends_with(".py") {
            return vec![FileRole::Other];
        }

        let mut segments: Vec<&str> = path.split('/').collect();
        let file_name = segments.pop().unwrap_or_default();
        let in_dir = |dir: &str| segments.contains(&dir);

        // Migration modules embed field constructors for every model they
        // touch, so they never take any other role.
        let migration_path = segments.last() == Some(&"migrations")
            && file_name.starts_with(|c: char| c.is_ascii_digit());
        if migration_path || any_match(&self.signatures.migration, content) {
            return vec![FileRole::Migration];
        }

        let mut roles = Vec::new();

        if file_name == "models.py"
            || in_dir("models")
            || any_match(&self.signatures.model, content)
        {
            roles.push(FileRole::Model);
        }

        if matches!(file_name, "urls.py" | "routes.py")
            || any_match(&self.signatures.route, content)
        {
            roles.push(FileRole::Route);
        }

        if matches!(file_name, "views.py" | "viewsets.py" | "api.py")
            || in_dir("views")
            || in_dir("viewsets")
            || any_match(&self.signatures.handler, content)
        {
            roles.push(FileRole::Handler);
        }

        if file_name == "serializers.py"
            || in_dir("serializers")
            || any_match(&self.signatures.serializer, content)
        {
            roles.push(FileRole::Serializer);
        }

        // `models/__init__.py` and friends carry no declarations of their own
        // unless the content says otherwise.
        if file_name == "__init__.py" {
            roles.retain(|role| match role {
                FileRole::Model => any_match(&self.signatures.model, content),
                FileRole::Handler => any_match(&self.signatures.handler, content),
                FileRole::Serializer => any_match(&self.signatures.serializer, content),
                _ => true,
            });
        }

        normalize(roles)
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(mut roles: Vec<FileRole>) -> Vec<FileRole> {
    roles.sort();
    roles.dedup();
    if roles.len() > 1 {
        roles.retain(|role| role.is_extractable());
    }
    if roles.is_empty() {
        roles.push(FileRole::Other);
    }
    roles
}
