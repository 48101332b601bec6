use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::builder::ContextBuilder;
use super::graph::ContextGraph;
use super::resolver::ReferenceResolver;
use super::scanner::{ProjectScanner, ScanStats};
use super::Diagnostic;
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::parsers::cache::EntityCache;

/// Result of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisOutput {
    pub graph: ContextGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
}

/// Single entry point: scan, extract, resolve, build.
pub struct CodeAnalyzer {
    scanner: ProjectScanner,
    resolver: ReferenceResolver,
}

impl CodeAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            scanner: ProjectScanner::new(config)?,
            resolver: ReferenceResolver::new(config.tie_break),
        })
    }

    /// Fails only when `root` cannot be read as a directory; every other
    /// problem ends up in [`AnalysisOutput::diagnostics`].
    pub fn analyze(&self, root: &Path, cache: &dyn EntityCache) -> Result<AnalysisOutput> {
        check_root(root)?;

        info!("Scanning project...");
        let scan = self.scanner.scan(root, cache)?;
        info!(
            "Found {} entities in {} files",
            scan.entities.len(),
            scan.files.len()
        );

        info!("Resolving references...");
        let resolution = self.resolver.resolve(&scan.entities);

        info!("Building context graph...");
        let graph = ContextBuilder::new(project_name(root)).build(
            &scan.files,
            &scan.entities,
            &resolution.links,
        );
        info!(
            "Resolved {} of {} links ({} ambiguous, {} unresolved)",
            graph.totals.resolved,
            graph.totals.links,
            graph.totals.ambiguous,
            graph.totals.unresolved
        );

        let mut diagnostics = scan.diagnostics;
        diagnostics.extend(resolution.diagnostics);
        diagnostics.sort();
        diagnostics.dedup();

        Ok(AnalysisOutput {
            graph,
            diagnostics,
            stats: scan.stats,
        })
    }
}

fn check_root(root: &Path) -> Result<()> {
    let unreadable = |reason: String| AnalysisError::UnreadableRoot {
        path: root.to_path_buf(),
        reason,
    };
    let metadata = fs::metadata(root).map_err(|err| unreadable(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(unreadable("not a directory".to_string()));
    }
    fs::read_dir(root).map_err(|err| unreadable(err.to_string()))?;
    Ok(())
}

fn project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("project")
        .to_string()
}
