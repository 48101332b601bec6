use tree_sitter::Node as TSNode;

use super::common::{
    base_classes, body_statements, compact, definition_name, definitions, extract_text,
    is_framework_base, last_segment, line_of, reference_name, Assignment, CallParts,
};
use super::{EntitySink, SourceFile};
use crate::core::{AttributeDescriptor, EntityKind, LinkKind, RawEntity};

const MODEL_BASES: &[&str] = &["AbstractUser", "AbstractBaseUser", "PermissionsMixin"];

/// Extracts Django model classes with their declared fields and `Meta` options.
pub fn extract(file: &SourceFile, root: TSNode, sink: &mut EntitySink) {
    let mut models_in_file: Vec<String> = Vec::new();

    for definition in definitions(root, &["class_definition"]) {
        let class = definition.node;
        let Some(name) = definition_name(&class, file.source) else {
            continue;
        };
        let bases = base_classes(&class, file.source);
        let body = body_statements(class);
        if !is_model(&bases, &body, file.source, &models_in_file) {
            continue;
        }
        models_in_file.push(name.clone());

        let mut entity = RawEntity::new(
            EntityKind::Model,
            name.clone(),
            file.path.to_string(),
            line_of(&class),
        );

        for base in bases.iter().filter(|base| !is_framework_base(base)) {
            entity.push_attribute(
                "base",
                AttributeDescriptor::reference(last_segment(base), LinkKind::Inherits),
            );
        }

        for statement in &body {
            match statement.kind() {
                "expression_statement" => {
                    let Some(assignment) = Assignment::parse(*statement, file.source) else {
                        continue;
                    };
                    if let Some(descriptor) = field_descriptor(&assignment, &name, file.source) {
                        entity.push_attribute(assignment.target, descriptor);
                    }
                }
                "class_definition" => {
                    if definition_name(statement, file.source).as_deref() == Some("Meta") {
                        push_meta_options(&mut entity, *statement, file.source);
                    }
                }
                _ => {}
            }
        }

        sink.check_complete(&mut entity, class);
        sink.push(entity);
    }
}

fn is_model(bases: &[String], body: &[TSNode], source: &[u8], models_in_file: &[String]) -> bool {
    let names: Vec<&str> = bases.iter().map(|base| last_segment(base)).collect();
    if names
        .iter()
        .any(|name| name.ends_with("Serializer") || name.ends_with("Form"))
    {
        return false;
    }
    if names.iter().any(|name| {
        name.ends_with("Model")
            || MODEL_BASES.contains(name)
            || models_in_file.iter().any(|model| model.as_str() == *name)
    }) {
        return true;
    }
    body.iter().any(|statement| {
        Assignment::parse(*statement, source)
            .and_then(|assignment| assignment.value)
            .and_then(|value| CallParts::parse(value, source))
            .map(|call| is_model_field(&call.callee))
            .unwrap_or(false)
    })
}

/// `models.CharField`, `ForeignKey`, `models.GenericForeignKey`, ...
fn is_model_field(callee: &str) -> bool {
    let head = callee.split('.').next().unwrap_or(callee);
    let name = last_segment(callee);
    (!callee.contains('.') || head == "models")
        && (name.ends_with("Field")
            || name == "GenericForeignKey"
            || LinkKind::for_field_type(name).is_some())
}

fn field_descriptor(
    assignment: &Assignment,
    model_name: &str,
    source: &[u8],
) -> Option<AttributeDescriptor> {
    let call = CallParts::parse(assignment.value?, source)?;
    if !is_model_field(&call.callee) {
        return None;
    }
    let field_type = call.callee_name();
    let mut descriptor = AttributeDescriptor::typed(field_type);

    if let Some(default) = call.keyword("default") {
        descriptor = descriptor.with_default(compact(extract_text(&default, source)));
    }

    if let Some(kind) = LinkKind::for_field_type(field_type) {
        let target = call
            .argument("to", 0)
            .and_then(|node| reference_name(&node, source));
        if let Some(target) = target {
            let target = if target == "self" {
                model_name.to_string()
            } else {
                target
            };
            descriptor = descriptor.with_relation(target, kind);
        }
    }

    Some(descriptor)
}

fn push_meta_options(entity: &mut RawEntity, meta: TSNode, source: &[u8]) {
    for statement in body_statements(meta) {
        let Some(assignment) = Assignment::parse(statement, source) else {
            continue;
        };
        let Some(value) = assignment.value else {
            continue;
        };
        entity.push_attribute(
            format!("Meta.{}", assignment.target),
            AttributeDescriptor::literal(compact(extract_text(&value, source))),
        );
    }
}
