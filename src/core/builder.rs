use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::graph::{ContextGraph, EntityNode, FileSummary, Totals, FORMAT_VERSION};
use super::resolver::ResolvedLink;
use super::scanner::FileRecord;
use super::{LinkKind, RawEntity};

/// Merges scan and resolution results into a [`ContextGraph`].
///
/// The output depends only on the sets passed in, never on their order.
pub struct ContextBuilder {
    project: String,
}

impl ContextBuilder {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn build(
        &self,
        files: &[FileRecord],
        entities: &[RawEntity],
        links: &[ResolvedLink],
    ) -> ContextGraph {
        let mut nodes = Self::sorted_entities(entities);
        let positions: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (node.id.as_str(), pos))
            .collect();

        let mut links: Vec<ResolvedLink> = links
            .iter()
            .filter(|link| positions.contains_key(link.source.as_str()))
            .cloned()
            .collect();
        links.sort_by(|a, b| {
            (positions[a.source.as_str()], a.attribute_index, &a.reference, &a.target).cmp(&(
                positions[b.source.as_str()],
                b.attribute_index,
                &b.reference,
                &b.target,
            ))
        });
        links.dedup();

        let aggregates = Self::aggregate(nodes.len(), &positions, &links);
        for (node, (fan_in, fan_out)) in nodes.iter_mut().zip(aggregates) {
            node.fan_in = fan_in;
            node.fan_out = fan_out;
            node.orphan = fan_in == 0 && fan_out == 0;
        }

        let mut per_file: HashMap<&str, usize> = HashMap::new();
        for node in &nodes {
            *per_file.entry(node.source_file.as_str()).or_insert(0) += 1;
        }
        let mut summaries: Vec<FileSummary> = files
            .iter()
            .map(|record| {
                let count = per_file.get(record.path.as_str()).copied().unwrap_or(0);
                FileSummary::from_record(record, count)
            })
            .collect();
        summaries.sort_by(|a, b| a.path.cmp(&b.path));
        summaries.dedup_by(|a, b| a.path == b.path);

        let totals = Totals::count(&summaries, &nodes, &links);
        debug!(
            "Built context graph: {} entities, {} links, {} orphans",
            totals.entities, totals.links, totals.orphans
        );

        ContextGraph {
            format_version: FORMAT_VERSION.to_string(),
            project: self.project.clone(),
            files: summaries,
            entities: nodes,
            links,
            totals,
        }
    }

    /// One node per entity id, ordered by (kind, source file, declaration
    /// order).
    fn sorted_entities(entities: &[RawEntity]) -> Vec<EntityNode> {
        let mut by_id: BTreeMap<&str, &RawEntity> = BTreeMap::new();
        for entity in entities {
            by_id
                .entry(entity.id.as_str())
                .and_modify(|kept| {
                    if (&entity.source_file, entity.order) < (&kept.source_file, kept.order) {
                        *kept = entity;
                    }
                })
                .or_insert(entity);
        }

        let mut unique: Vec<&RawEntity> = by_id.into_values().collect();
        unique.sort_by(|a, b| {
            (a.kind, &a.source_file, a.order, &a.id).cmp(&(b.kind, &b.source_file, b.order, &b.id))
        });
        unique.into_iter().map(EntityNode::from_entity).collect()
    }

    /// `(fan_in, fan_out)` per node position. Resolved links become graph
    /// edges; dangling ones only count towards their source's fan-out.
    fn aggregate(
        node_count: usize,
        positions: &HashMap<&str, usize>,
        links: &[ResolvedLink],
    ) -> Vec<(usize, usize)> {
        let mut graph: DiGraph<usize, LinkKind> = DiGraph::with_capacity(node_count, links.len());
        let indices: Vec<NodeIndex> = (0..node_count).map(|pos| graph.add_node(pos)).collect();

        let mut dangling = vec![0usize; node_count];
        for link in links {
            let source = positions[link.source.as_str()];
            match link
                .target
                .as_deref()
                .and_then(|target| positions.get(target))
            {
                Some(&target) => {
                    graph.add_edge(indices[source], indices[target], link.kind);
                }
                None => dangling[source] += 1,
            }
        }

        indices
            .iter()
            .enumerate()
            .map(|(pos, &index)| {
                let fan_in = graph.edges_directed(index, Direction::Incoming).count();
                let fan_out = graph.edges_directed(index, Direction::Outgoing).count() + dangling[pos];
                (fan_in, fan_out)
            })
            .collect()
    }
}
