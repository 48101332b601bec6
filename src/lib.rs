//! # django-context
//!
//! Static extraction of a Django project's structure for AI tooling.
//!
//! The pipeline walks a project tree, classifies each Python file by role
//! (models, url tables, views, serializers, migrations), extracts declared
//! entities with tree-sitter, links references between them across files
//! and assembles a deterministic, versioned context graph.
//!
//! ```no_run
//! use django_context::config::AnalyzerConfig;
//! use django_context::core::CodeAnalyzer;
//! use django_context::parsers::cache::MemoryCache;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = CodeAnalyzer::new(&AnalyzerConfig::default())?;
//! let output = analyzer.analyze(Path::new("my_project"), &MemoryCache::new())?;
//! println!("{} entities", output.graph.totals.entities);
//! # Ok(())
//! # }
//! ```
//!
//! Source is never executed; only structural conventions are recognized.

pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod parsers;
