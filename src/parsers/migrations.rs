use tree_sitter::Node as TSNode;

use super::common::{
    base_classes, body_statements, compact, definition_name, definitions, extract_text, line_of,
    named_children, string_value, Assignment, CallParts,
};
use super::{EntitySink, SourceFile};
use crate::core::{AttributeDescriptor, DiagnosticKind, EntityKind, LinkKind, RawEntity};

/// Operations whose model is named by `name` rather than `model_name`.
const MODEL_OPERATIONS: &[&str] = &[
    "CreateModel",
    "DeleteModel",
    "AlterModelOptions",
    "AlterModelTable",
    "AlterModelManagers",
    "AlterUniqueTogether",
    "AlterIndexTogether",
    "AlterOrderWithRespectTo",
];

const SCRIPT_OPERATIONS: &[&str] = &["RunPython", "RunSQL", "SeparateDatabaseAndState"];

/// Extracts the `Migration` class of a migration module, named
/// `<app_label>.<module>` so dependencies can refer to it.
pub fn extract(file: &SourceFile, root: TSNode, sink: &mut EntitySink) {
    for definition in definitions(root, &["class_definition"]) {
        let class = definition.node;
        let is_migration = definition_name(&class, file.source).as_deref() == Some("Migration")
            || base_classes(&class, file.source)
                .iter()
                .any(|base| base == "migrations.Migration");
        if !is_migration {
            continue;
        }

        let mut entity = RawEntity::new(
            EntityKind::Migration,
            migration_name(file.path),
            file.path.to_string(),
            line_of(&class),
        );

        for statement in body_statements(class) {
            let Some(assignment) = Assignment::parse(statement, file.source) else {
                continue;
            };
            let Some(value) = assignment.value else {
                continue;
            };
            match assignment.target.as_str() {
                "dependencies" => push_dependencies(&mut entity, value, file.source),
                "operations" => push_operations(&mut entity, value, file.source, sink),
                _ => entity.push_attribute(
                    assignment.target,
                    AttributeDescriptor::literal(compact(extract_text(&value, file.source))),
                ),
            }
        }

        sink.check_complete(&mut entity, class);
        sink.push(entity);
    }
}

/// `shop/migrations/0002_order_note.py` -> `shop.0002_order_note`
pub fn migration_name(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    let file_name = segments.pop().unwrap_or_default();
    let stem = file_name.strip_suffix(".py").unwrap_or(file_name);
    let app = match segments.pop() {
        Some("migrations") => segments.pop(),
        other => other,
    };
    match app {
        Some(app) => format!("{app}.{stem}"),
        None => stem.to_string(),
    }
}

fn push_dependencies(entity: &mut RawEntity, value: TSNode, source: &[u8]) {
    for dependency in named_children(value) {
        let parts: Vec<String> = match dependency.kind() {
            "tuple" | "list" => named_children(dependency)
                .iter()
                .filter_map(|part| string_value(part, source))
                .collect(),
            _ => Vec::new(),
        };
        match parts.as_slice() {
            [app, name] => entity.push_attribute(
                "dependency",
                AttributeDescriptor::reference(format!("{app}.{name}"), LinkKind::MigrationDependsOn),
            ),
            _ => entity.push_attribute(
                "dependency",
                AttributeDescriptor::literal(compact(extract_text(&dependency, source))),
            ),
        }
    }
}

fn push_operations(entity: &mut RawEntity, value: TSNode, source: &[u8], sink: &mut EntitySink) {
    for (index, operation) in named_children(value).into_iter().enumerate() {
        let attribute = format!("operations[{index}]");
        let Some(call) = CallParts::parse(operation, source) else {
            entity.push_attribute(
                attribute,
                AttributeDescriptor::literal(compact(extract_text(&operation, source))),
            );
            continue;
        };
        let operation_name = call.callee_name();

        if SCRIPT_OPERATIONS.contains(&operation_name) {
            entity.push_attribute(attribute, AttributeDescriptor::typed(operation_name));
            continue;
        }

        let (model, field) = if operation_name == "RenameModel" {
            (call.argument("new_name", 1), call.argument("old_name", 0))
        } else if MODEL_OPERATIONS.contains(&operation_name) {
            (call.argument("name", 0), None)
        } else {
            (call.argument("model_name", 0), call.argument("name", 1))
        };

        let mut descriptor = AttributeDescriptor::typed(operation_name);
        if let Some(field) = field.and_then(|node| string_value(&node, source)) {
            descriptor = descriptor.with_default(field);
        }
        match model.and_then(|node| string_value(&node, source)) {
            Some(model) => {
                descriptor = descriptor.with_relation(model, LinkKind::MigrationTouchesModel);
            }
            None => {
                entity.mark_incomplete();
                sink.diagnose(
                    DiagnosticKind::ParseIncomplete,
                    format!(
                        "{operation_name} at line {} in `{}` names no model",
                        line_of(&operation),
                        entity.name
                    ),
                );
            }
        }
        entity.push_attribute(attribute, descriptor);
    }
}
