use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::TieBreak;
use crate::core::{Diagnostic, DiagnosticKind, EntityId, EntityKind, LinkKind, RawEntity};

/// How firmly a reference string was matched to an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    Resolved,
    Ambiguous,
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedLink {
    pub source: EntityId,
    /// `None` when no entity carries the referenced name.
    pub target: Option<EntityId>,
    /// The reference exactly as written in the source entity.
    pub reference: String,
    pub attribute: String,
    /// Position of `attribute` within the source entity's attribute list.
    pub attribute_index: usize,
    pub kind: LinkKind,
    pub confidence: Confidence,
    pub candidates: usize,
}

/// Links and resolution diagnostics for one entity set.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub links: Vec<ResolvedLink>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Name lookup built in one pass over every entity before any reference is
/// resolved, so declaration order across files never matters.
struct NameIndex<'a> {
    exact: HashMap<&'a str, Vec<&'a RawEntity>>,
    folded: HashMap<String, Vec<&'a RawEntity>>,
}

impl<'a> NameIndex<'a> {
    fn build(entities: &'a [RawEntity]) -> Self {
        let mut exact: HashMap<&'a str, Vec<&'a RawEntity>> = HashMap::with_capacity(entities.len());
        let mut folded: HashMap<String, Vec<&'a RawEntity>> = HashMap::new();
        for entity in entities {
            exact.entry(entity.name.as_str()).or_default().push(entity);
            folded
                .entry(entity.name.to_ascii_lowercase())
                .or_default()
                .push(entity);
        }

        for bucket in exact.values_mut().chain(folded.values_mut()) {
            bucket.sort_by(|a, b| {
                (&a.source_file, a.order, a.kind, &a.id).cmp(&(&b.source_file, b.order, b.kind, &b.id))
            });
            bucket.dedup_by(|a, b| a.id == b.id);
        }

        Self { exact, folded }
    }

    fn candidates(&self, name: &str, kind: LinkKind) -> Vec<&'a RawEntity> {
        if kind != LinkKind::MigrationTouchesModel {
            return self.exact.get(name).cloned().unwrap_or_default();
        }

        // Migrations only ever touch models, and Django writes `model_name`
        // in lowercase.
        let models = |bucket: Option<&Vec<&'a RawEntity>>| -> Vec<&'a RawEntity> {
            bucket
                .into_iter()
                .flatten()
                .copied()
                .filter(|candidate| candidate.kind == EntityKind::Model)
                .collect()
        };
        let exact = models(self.exact.get(name));
        if !exact.is_empty() {
            return exact;
        }
        models(self.folded.get(&name.to_ascii_lowercase()))
    }
}

/// Turns by-name relations on raw entities into links between entity ids.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    tie_break: TieBreak,
}

impl ReferenceResolver {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn resolve(&self, entities: &[RawEntity]) -> Resolution {
        let index = NameIndex::build(entities);

        let per_entity: Vec<Vec<ResolvedLink>> = entities
            .par_iter()
            .map(|entity| self.resolve_entity(entity, &index))
            .collect();

        let mut links: Vec<ResolvedLink> = per_entity.into_iter().flatten().collect();
        links.sort_by(|a, b| {
            (&a.source, a.attribute_index, &a.reference)
                .cmp(&(&b.source, b.attribute_index, &b.reference))
        });
        links.dedup();

        let sources: HashMap<&str, &RawEntity> =
            entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut diagnostics: Vec<Diagnostic> = links
            .iter()
            .filter_map(|link| {
                let source = sources.get(link.source.as_str())?;
                link_diagnostic(source, link)
            })
            .collect();
        diagnostics.sort();

        Resolution { links, diagnostics }
    }

    fn resolve_entity(&self, entity: &RawEntity, index: &NameIndex) -> Vec<ResolvedLink> {
        entity
            .relations()
            .map(|(position, attribute, relation)| {
                let candidates = index.candidates(&relation.target, relation.kind);
                let (target, confidence) = match candidates.as_slice() {
                    [] => (None, Confidence::Unresolved),
                    [only] => (Some(only.id.clone()), Confidence::Resolved),
                    several => (
                        self.choose(entity, relation.kind, several)
                            .map(|chosen| chosen.id.clone()),
                        Confidence::Ambiguous,
                    ),
                };
                ResolvedLink {
                    source: entity.id.clone(),
                    target,
                    reference: relation.target.clone(),
                    attribute: attribute.name.clone(),
                    attribute_index: position,
                    kind: relation.kind,
                    confidence,
                    candidates: candidates.len(),
                }
            })
            .collect()
    }

    fn choose<'a>(
        &self,
        source: &RawEntity,
        kind: LinkKind,
        candidates: &[&'a RawEntity],
    ) -> Option<&'a RawEntity> {
        let preferred = kind.preferred_target(source.kind);
        candidates.iter().copied().min_by(|a, b| {
            let rank = |candidate: &RawEntity| {
                let off_role = match self.tie_break {
                    TieBreak::RolePreference => candidate.kind != preferred,
                    TieBreak::PathOrder => false,
                };
                let other_file = candidate.source_file != source.source_file;
                (off_role, other_file)
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.source_file.cmp(&b.source_file))
                .then_with(|| a.order.cmp(&b.order))
                .then_with(|| a.id.cmp(&b.id))
        })
    }
}

fn link_diagnostic(source: &RawEntity, link: &ResolvedLink) -> Option<Diagnostic> {
    let message = match link.confidence {
        Confidence::Resolved => return None,
        Confidence::Unresolved => format!(
            "{} reference `{}` in {} `{}` ({}) matches no entity",
            link.kind, link.reference, source.kind, source.name, link.attribute
        ),
        Confidence::Ambiguous => format!(
            "{} reference `{}` in {} `{}` ({}) matches {} entities; chose {}",
            link.kind,
            link.reference,
            source.kind,
            source.name,
            link.attribute,
            link.candidates,
            link.target.as_deref().unwrap_or("none")
        ),
    };
    let kind = match link.confidence {
        Confidence::Ambiguous => DiagnosticKind::Ambiguous,
        _ => DiagnosticKind::Unresolved,
    };
    Some(Diagnostic::new(source.source_file.clone(), kind, message))
}
