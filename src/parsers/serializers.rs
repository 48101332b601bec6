use tree_sitter::Node as TSNode;

use super::common::{
    base_classes, body_statements, compact, definition_name, definitions, extract_text,
    is_framework_base, last_segment, line_of, reference_name, Assignment, CallParts,
};
use super::{EntitySink, SourceFile};
use crate::core::{AttributeDescriptor, EntityKind, LinkKind, RawEntity};

/// Extracts serializer classes, their declared fields and the model their
/// `Meta` wraps.
pub fn extract(file: &SourceFile, root: TSNode, sink: &mut EntitySink) {
    let mut serializers_in_file: Vec<String> = Vec::new();

    for definition in definitions(root, &["class_definition"]) {
        let class = definition.node;
        let Some(name) = definition_name(&class, file.source) else {
            continue;
        };
        let bases = base_classes(&class, file.source);
        let is_serializer = bases.iter().map(|base| last_segment(base)).any(|base| {
            base.ends_with("Serializer") || serializers_in_file.iter().any(|s| s.as_str() == base)
        });
        if !is_serializer {
            continue;
        }
        serializers_in_file.push(name.clone());

        let mut entity = RawEntity::new(
            EntityKind::Serializer,
            name,
            file.path.to_string(),
            line_of(&class),
        );
        for base in bases.iter().filter(|base| !is_framework_base(base)) {
            entity.push_attribute(
                "base",
                AttributeDescriptor::reference(last_segment(base), LinkKind::Inherits),
            );
        }

        for statement in body_statements(class) {
            match statement.kind() {
                "expression_statement" => push_field(&mut entity, statement, file.source),
                "class_definition" => {
                    if definition_name(&statement, file.source).as_deref() == Some("Meta") {
                        push_meta(&mut entity, statement, file.source);
                    }
                }
                _ => {}
            }
        }

        sink.check_complete(&mut entity, class);
        sink.push(entity);
    }
}

fn push_field(entity: &mut RawEntity, statement: TSNode, source: &[u8]) {
    let Some(assignment) = Assignment::parse(statement, source) else {
        return;
    };
    let Some(call) = assignment
        .value
        .and_then(|value| CallParts::parse(value, source))
    else {
        return;
    };
    let field_type = call.callee_name();

    let descriptor = if field_type.ends_with("Serializer") && !is_framework_base(&call.callee) {
        AttributeDescriptor::reference(field_type, LinkKind::SerializerNests)
    } else if field_type.ends_with("Field") {
        let mut descriptor = AttributeDescriptor::typed(field_type);
        if let Some(default) = call.keyword("default") {
            descriptor = descriptor.with_default(compact(extract_text(&default, source)));
        }
        descriptor
    } else {
        return;
    };

    let descriptor = match call.keyword("source") {
        Some(source_node) if descriptor.default.is_none() => {
            descriptor.with_default(compact(extract_text(&source_node, source)))
        }
        _ => descriptor,
    };
    entity.push_attribute(assignment.target, descriptor);
}

fn push_meta(entity: &mut RawEntity, meta: TSNode, source: &[u8]) {
    for statement in body_statements(meta) {
        let Some(assignment) = Assignment::parse(statement, source) else {
            continue;
        };
        let Some(value) = assignment.value else {
            continue;
        };
        let name = format!("Meta.{}", assignment.target);
        let descriptor = match assignment.target.as_str() {
            "model" => match reference_name(&value, source) {
                Some(model) => {
                    AttributeDescriptor::reference(model, LinkKind::SerializerWrapsModel)
                }
                None => AttributeDescriptor::literal(compact(extract_text(&value, source))),
            },
            _ => AttributeDescriptor::literal(compact(extract_text(&value, source))),
        };
        entity.push_attribute(name, descriptor);
    }
}
