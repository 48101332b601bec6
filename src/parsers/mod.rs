pub mod cache;
pub mod common;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod routes;
pub mod serializers;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tree_sitter::Node as TSNode;

use self::common::{extract_text, first_error_line, line_of, named_children, TreeSitterParser};
use crate::core::{Diagnostic, DiagnosticKind, EntityKind, FileRole, RawEntity};
use crate::error::Result;

/// Bumped whenever extraction output changes shape, invalidating cache entries.
pub const EXTRACTOR_VERSION: u32 = 1;

/// Entities and diagnostics produced from a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    pub entities: Vec<RawEntity>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse state shared by the role extractors for one file.
pub struct SourceFile<'a> {
    /// Path relative to the project root.
    pub path: &'a str,
    pub source: &'a [u8],
}

/// Collects entities for one file, assigning declaration order and keeping
/// `(kind, name)` unique within the file.
pub struct EntitySink<'a> {
    file: &'a str,
    entities: Vec<RawEntity>,
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(EntityKind, String)>,
}

impl<'a> EntitySink<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            entities: Vec::new(),
            diagnostics: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.seen.contains(&(kind, name.to_string()))
    }

    /// Adds a declaration. A second declaration of the same name shadows the
    /// first in Python, so it is kept as `name#order` and reported.
    pub fn push(&mut self, entity: RawEntity) {
        self.insert(entity, true);
    }

    /// Adds an entry that may legitimately repeat its name, such as several
    /// `path("", include(...))` routes. Repeats get `name#order` silently.
    pub fn push_repeatable(&mut self, entity: RawEntity) {
        self.insert(entity, false);
    }

    fn insert(&mut self, mut entity: RawEntity, report_duplicate: bool) {
        entity.order = self.entities.len();
        if self.contains(entity.kind, &entity.name) {
            let renamed = format!("{}#{}", entity.name, entity.order);
            if report_duplicate {
                self.diagnose(
                    DiagnosticKind::ParseIncomplete,
                    format!(
                        "duplicate {} `{}` at line {}; kept as `{}`",
                        entity.kind, entity.name, entity.line, renamed
                    ),
                );
            }
            entity.rename(renamed);
        }
        self.seen.insert((entity.kind, entity.name.clone()));
        self.entities.push(entity);
    }

    /// Flags `entity` as partial when `node` contains a syntax error.
    pub fn check_complete(&mut self, entity: &mut RawEntity, node: TSNode) {
        if let Some(line) = first_error_line(node) {
            entity.mark_incomplete();
            self.diagnose(
                DiagnosticKind::ParseIncomplete,
                format!(
                    "{} `{}` has a syntax error at line {}",
                    entity.kind, entity.name, line
                ),
            );
        }
    }

    /// Marks the entity declared at `line` as partial because of a syntax
    /// error at `error_line`. Returns false when no entity starts there.
    pub fn flag_incomplete_at(&mut self, line: usize, error_line: usize) -> bool {
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.line == line) else {
            return false;
        };
        if !entity.parse_incomplete {
            entity.mark_incomplete();
            let message = format!(
                "{} `{}` has a syntax error at line {}",
                entity.kind, entity.name, error_line
            );
            self.diagnose(DiagnosticKind::ParseIncomplete, message);
        }
        true
    }

    pub fn diagnose(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics
            .push(Diagnostic::new(self.file, kind, message));
    }

    fn finish(self) -> ExtractionResult {
        ExtractionResult {
            entities: self.entities,
            diagnostics: self.diagnostics,
        }
    }
}

/// Parses one file into raw entities according to its roles.
///
/// Extraction is file-local: names of entities declared elsewhere stay as
/// plain strings inside attribute relations.
pub struct EntityExtractor {
    recover_class: Regex,
    recover_view: Regex,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            recover_class: Regex::new(r"(?m)^class\s+([A-Za-z_]\w*)").expect("static regex"),
            recover_view: Regex::new(r"(?m)^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(\s*request\b")
                .expect("static regex"),
        }
    }

    pub fn extract(&self, path: &str, content: &str, roles: &[FileRole]) -> Result<ExtractionResult> {
        let mut sink = EntitySink::new(path);
        let extracting: Vec<FileRole> = roles
            .iter()
            .copied()
            .filter(|role| role.is_extractable())
            .collect();
        if extracting.is_empty() {
            return Ok(sink.finish());
        }

        let mut parser = TreeSitterParser::python()?;
        let tree = parser.parse(content)?;
        let root = tree.root_node();
        let file = SourceFile {
            path,
            source: content.as_bytes(),
        };

        for role in &extracting {
            match role {
                FileRole::Model => models::extract(&file, root, &mut sink),
                FileRole::Route => routes::extract(&file, root, &mut sink),
                FileRole::Handler => handlers::extract(&file, root, &mut sink),
                FileRole::Serializer => serializers::extract(&file, root, &mut sink),
                FileRole::Migration => migrations::extract(&file, root, &mut sink),
                FileRole::Other => {}
            }
        }

        if root.has_error() {
            self.recover_from_errors(&file, root, &extracting, &mut sink);
        }

        Ok(sink.finish())
    }

    /// Declarations swallowed by a top-level error region are still reported
    /// by name, as partial entities without attributes. A region that names
    /// nothing is charged to the declaration right before it, or to the file.
    fn recover_from_errors(
        &self,
        file: &SourceFile,
        root: TSNode,
        roles: &[FileRole],
        sink: &mut EntitySink,
    ) {
        let class_kind = roles
            .iter()
            .find(|role| **role != FileRole::Route)
            .map(|role| role.entity_kind());
        let handles_views = roles.contains(&FileRole::Handler);

        let regions: Vec<TSNode> = if root.is_error() {
            vec![root]
        } else {
            named_children(root)
                .into_iter()
                .filter(|node| node.is_error())
                .collect()
        };

        for node in regions {
            let text = extract_text(&node, file.source);
            let base_line = line_of(&node);

            let mut recovered = Vec::new();
            if let Some(kind) = class_kind {
                for capture in self.recover_class.captures_iter(text) {
                    recovered.push((kind, capture));
                }
            }
            if handles_views {
                for capture in self.recover_view.captures_iter(text) {
                    recovered.push((EntityKind::Handler, capture));
                }
            }

            if recovered.is_empty() {
                let owner = node
                    .prev_named_sibling()
                    .map(|sibling| match sibling.kind() {
                        "decorated_definition" => {
                            sibling.child_by_field_name("definition").unwrap_or(sibling)
                        }
                        _ => sibling,
                    })
                    .map(|sibling| line_of(&sibling));
                if !owner.is_some_and(|line| sink.flag_incomplete_at(line, base_line)) {
                    sink.diagnose(
                        DiagnosticKind::ParseIncomplete,
                        format!("syntax error at line {base_line} outside any declaration"),
                    );
                }
                continue;
            }

            for (kind, capture) in recovered {
                let Some(matched) = capture.get(1) else {
                    continue;
                };
                let name = matched.as_str();
                if sink.contains(kind, name) {
                    continue;
                }
                let line = base_line + text[..matched.start()].matches('\n').count();
                let mut entity =
                    RawEntity::new(kind, name.to_string(), file.path.to_string(), line);
                entity.mark_incomplete();
                sink.diagnose(
                    DiagnosticKind::ParseIncomplete,
                    format!("{kind} `{name}` at line {line} could not be parsed; recorded by name only"),
                );
                sink.push(entity);
            }
        }
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}
