use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::resolver::{Confidence, ResolvedLink};
use super::scanner::{FileRecord, ScanStatus};
use super::{Attribute, EntityId, EntityKind, FileRole, RawEntity};

/// Version of the serialized context document.
pub const FORMAT_VERSION: &str = "1.0";

/// Deterministic snapshot of a project's entities and the links between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextGraph {
    pub format_version: String,
    pub project: String,
    pub files: Vec<FileSummary>,
    pub entities: Vec<EntityNode>,
    pub links: Vec<ResolvedLink>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSummary {
    pub path: String,
    pub fingerprint: Option<String>,
    pub roles: Vec<FileRole>,
    pub readable: bool,
    pub entities: usize,
}

impl FileSummary {
    pub fn from_record(record: &FileRecord, entities: usize) -> Self {
        Self {
            path: record.path.clone(),
            fingerprint: record.fingerprint.clone(),
            roles: record.roles.clone(),
            readable: record.status != ScanStatus::Unreadable,
            entities,
        }
    }
}

/// A [`RawEntity`] together with its link aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityNode {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub source_file: String,
    pub line: usize,
    pub order: usize,
    pub parse_incomplete: bool,
    pub attributes: Vec<Attribute>,
    /// Links with a target that point at this entity.
    pub fan_in: usize,
    /// Every link declared by this entity, resolved or not.
    pub fan_out: usize,
    pub orphan: bool,
}

impl EntityNode {
    pub fn from_entity(entity: &RawEntity) -> Self {
        Self {
            id: entity.id.clone(),
            kind: entity.kind,
            name: entity.name.clone(),
            source_file: entity.source_file.clone(),
            line: entity.line,
            order: entity.order,
            parse_incomplete: entity.parse_incomplete,
            attributes: entity.attributes.clone(),
            fan_in: 0,
            fan_out: 0,
            orphan: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Totals {
    pub files: usize,
    pub entities: usize,
    pub entities_by_kind: BTreeMap<EntityKind, usize>,
    pub links: usize,
    pub resolved: usize,
    pub ambiguous: usize,
    pub unresolved: usize,
    pub orphans: usize,
}

impl Totals {
    pub fn count(files: &[FileSummary], entities: &[EntityNode], links: &[ResolvedLink]) -> Self {
        let mut totals = Self {
            files: files.len(),
            entities: entities.len(),
            links: links.len(),
            ..Self::default()
        };
        for entity in entities {
            *totals.entities_by_kind.entry(entity.kind).or_insert(0) += 1;
            if entity.orphan {
                totals.orphans += 1;
            }
        }
        for link in links {
            match link.confidence {
                Confidence::Resolved => totals.resolved += 1,
                Confidence::Ambiguous => totals.ambiguous += 1,
                Confidence::Unresolved => totals.unresolved += 1,
            }
        }
        totals
    }
}

impl ContextGraph {
    pub fn entity(&self, id: &str) -> Option<&EntityNode> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    /// Entities with the given name, in output order.
    pub fn entities_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EntityNode> + 'a {
        self.entities.iter().filter(move |entity| entity.name == name)
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityNode> + '_ {
        self.entities.iter().filter(move |entity| entity.kind == kind)
    }

    pub fn links_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ResolvedLink> + 'a {
        self.links.iter().filter(move |link| link.source == id)
    }

    pub fn links_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ResolvedLink> + 'a {
        self.links
            .iter()
            .filter(move |link| link.target.as_deref() == Some(id))
    }

    pub fn orphans(&self) -> impl Iterator<Item = &EntityNode> + '_ {
        self.entities.iter().filter(|entity| entity.orphan)
    }
}
