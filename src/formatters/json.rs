use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::{AnalysisOutput, ContextGraph, Diagnostic, EntityNode, FileSummary, ResolvedLink, Totals};

/// Serialized layout of the context document. Field order here is the
/// order keys appear in the output.
#[derive(Serialize)]
struct ContextDocument<'a> {
    format_version: &'a str,
    project: &'a str,
    files: &'a [FileSummary],
    entities: &'a [EntityNode],
    links: &'a [ResolvedLink],
    totals: &'a Totals,
    diagnostics: &'a [Diagnostic],
}

impl<'a> ContextDocument<'a> {
    fn new(graph: &'a ContextGraph, diagnostics: &'a [Diagnostic]) -> Self {
        Self {
            format_version: &graph.format_version,
            project: &graph.project,
            files: &graph.files,
            entities: &graph.entities,
            links: &graph.links,
            totals: &graph.totals,
            diagnostics,
        }
    }
}

/// Writes the context graph and its diagnostics as JSON.
///
/// Scan statistics are left out so that re-running on an unchanged tree
/// yields the same bytes whether or not the cache was warm.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn format(&self, output: &AnalysisOutput) -> Result<String> {
        self.format_graph(&output.graph, &output.diagnostics)
    }

    pub fn format_graph(&self, graph: &ContextGraph, diagnostics: &[Diagnostic]) -> Result<String> {
        let document = ContextDocument::new(graph, diagnostics);
        let mut json = if self.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        json.push('\n');
        Ok(json)
    }

    pub fn format_to_file(&self, output: &AnalysisOutput, output_path: &Path) -> Result<()> {
        let json_content = self.format(output)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json_content)?;
        Ok(())
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}
