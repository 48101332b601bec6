pub mod analyzer;
pub mod builder;
pub mod classifier;
pub mod diagnostic;
pub mod entity;
pub mod graph;
pub mod resolver;
pub mod scanner;

pub use analyzer::{AnalysisOutput, CodeAnalyzer};
pub use builder::ContextBuilder;
pub use classifier::{FileClassifier, FileRole};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use entity::{
    entity_id, Attribute, AttributeDescriptor, EntityId, EntityKind, LinkKind, RawEntity, Relation,
};
pub use graph::{ContextGraph, EntityNode, FileSummary, Totals, FORMAT_VERSION};
pub use resolver::{Confidence, ReferenceResolver, Resolution, ResolvedLink};
pub use scanner::{fingerprint, FileRecord, ProjectScanner, ScanOutcome, ScanStats, ScanStatus};
