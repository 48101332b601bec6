use std::collections::BTreeSet;
use tree_sitter::Node as TSNode;

use super::common::{
    base_classes, body_statements, compact, decorator_expression, definition_name, definitions,
    extract_text, is_framework_base, last_segment, line_of, named_children, reference_name,
    root_identifier, string_value, Assignment, CallParts, Definition,
};
use super::{EntitySink, SourceFile};
use crate::core::{AttributeDescriptor, EntityKind, LinkKind, RawEntity};

const HTTP_METHODS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];

const VIEWSET_ACTIONS: &[&str] = &[
    "list",
    "create",
    "retrieve",
    "update",
    "partial_update",
    "destroy",
];

/// Extracts function-based views (first parameter `request`) and class-based
/// views/viewsets.
pub fn extract(file: &SourceFile, root: TSNode, sink: &mut EntitySink) {
    let mut views_in_file: Vec<String> = Vec::new();

    for definition in definitions(root, &["function_definition", "class_definition"]) {
        let entity = match definition.node.kind() {
            "function_definition" => function_view(file, &definition),
            _ => class_view(file, &definition, &views_in_file),
        };
        if let Some(mut entity) = entity {
            views_in_file.push(entity.name.clone());
            sink.check_complete(&mut entity, definition.node);
            sink.push(entity);
        }
    }
}

fn function_view(file: &SourceFile, definition: &Definition) -> Option<RawEntity> {
    let func = definition.node;
    let name = definition_name(&func, file.source)?;
    let parameters = func.child_by_field_name("parameters")?;
    if first_parameter(parameters, file.source)? != "request" {
        return None;
    }

    let mut entity = RawEntity::new(
        EntityKind::Handler,
        name,
        file.path.to_string(),
        line_of(&func),
    )
    .with_attribute(
        "signature",
        AttributeDescriptor::literal(compact(extract_text(&parameters, file.source))),
    );

    let methods = push_decorators(&mut entity, &definition.decorators, file.source);
    if !methods.is_empty() {
        entity.push_attribute("methods", AttributeDescriptor::literal(methods.join(",")));
    }
    push_usages(&mut entity, func, file.source);
    Some(entity)
}

fn first_parameter<'a>(parameters: TSNode, source: &'a [u8]) -> Option<&'a str> {
    let first = parameters.named_child(0)?;
    let name = match first.kind() {
        "identifier" => first,
        "typed_parameter" => first.named_child(0)?,
        "default_parameter" | "typed_default_parameter" => first.child_by_field_name("name")?,
        _ => return None,
    };
    Some(extract_text(&name, source))
}

fn is_view_class(bases: &[String], views_in_file: &[String]) -> bool {
    bases.iter().map(|base| last_segment(base)).any(|name| {
        name.ends_with("View")
            || name.ends_with("ViewSet")
            || views_in_file.iter().any(|view| view.as_str() == name)
    })
}

fn class_view(
    file: &SourceFile,
    definition: &Definition,
    views_in_file: &[String],
) -> Option<RawEntity> {
    let class = definition.node;
    let name = definition_name(&class, file.source)?;
    let bases = base_classes(&class, file.source);
    if !is_view_class(&bases, views_in_file) {
        return None;
    }

    let mut entity = RawEntity::new(
        EntityKind::Handler,
        name,
        file.path.to_string(),
        line_of(&class),
    );
    for base in &bases {
        if is_framework_base(base) {
            entity.push_attribute("base", AttributeDescriptor::typed(base.as_str()));
        } else {
            entity.push_attribute(
                "base",
                AttributeDescriptor::reference(last_segment(base), LinkKind::Inherits),
            );
        }
    }
    push_decorators(&mut entity, &definition.decorators, file.source);

    for statement in body_statements(class) {
        let Some(assignment) = Assignment::parse(statement, file.source) else {
            continue;
        };
        let Some(value) = assignment.value else {
            continue;
        };
        let text = compact(extract_text(&value, file.source));
        let descriptor = match assignment.target.as_str() {
            "queryset" => root_identifier(&value, file.source).map(|model| {
                AttributeDescriptor::reference(model, LinkKind::HandlerUsesModel)
                    .with_default(text.clone())
            }),
            "model" => reference_name(&value, file.source)
                .map(|model| AttributeDescriptor::reference(model, LinkKind::HandlerUsesModel)),
            "serializer_class" => reference_name(&value, file.source).map(|serializer| {
                AttributeDescriptor::reference(serializer, LinkKind::HandlerUsesSerializer)
            }),
            _ => None,
        };
        entity.push_attribute(
            assignment.target,
            descriptor.unwrap_or_else(|| AttributeDescriptor::literal(text)),
        );
    }

    let mut methods = Vec::new();
    if let Some(body) = class.child_by_field_name("body") {
        for method in definitions(body, &["function_definition"]) {
            let Some(method_name) = definition_name(&method.node, file.source) else {
                continue;
            };
            let action = method
                .decorators
                .iter()
                .filter_map(|decorator| decorator_expression(*decorator))
                .find(|expr| decorator_name(expr, file.source) == "action");

            if let Some(action) = action {
                entity.push_attribute(
                    format!("action:{method_name}"),
                    AttributeDescriptor::typed("action")
                        .with_default(compact(extract_text(&action, file.source))),
                );
            } else if HTTP_METHODS.contains(&method_name.as_str()) {
                methods.push(method_name.to_uppercase());
                entity.push_attribute(
                    format!("method:{method_name}"),
                    AttributeDescriptor::typed("http"),
                );
            } else if VIEWSET_ACTIONS.contains(&method_name.as_str()) {
                entity.push_attribute(
                    format!("action:{method_name}"),
                    AttributeDescriptor::typed("viewset"),
                );
            }
        }
    }
    if !methods.is_empty() {
        entity.push_attribute("methods", AttributeDescriptor::literal(methods.join(",")));
    }

    push_usages(&mut entity, class, file.source);
    Some(entity)
}

fn decorator_name(expr: &TSNode, source: &[u8]) -> String {
    let callee = match expr.kind() {
        "call" => expr
            .child_by_field_name("function")
            .map(|function| extract_text(&function, source))
            .unwrap_or_default(),
        _ => extract_text(expr, source),
    };
    last_segment(callee).to_string()
}

/// Records each decorator and returns the HTTP methods they restrict the
/// view to.
fn push_decorators(entity: &mut RawEntity, decorators: &[TSNode], source: &[u8]) -> Vec<String> {
    let mut methods = Vec::new();
    for decorator in decorators {
        let Some(expr) = decorator_expression(*decorator) else {
            continue;
        };
        let name = decorator_name(&expr, source);
        let arguments = CallParts::parse(expr, source);

        match name.as_str() {
            "api_view" | "require_http_methods" => {
                let listed: Vec<String> = arguments
                    .as_ref()
                    .and_then(|call| call.argument("http_method_names", 0))
                    .map(|list| {
                        named_children(list)
                            .iter()
                            .filter_map(|item| string_value(item, source))
                            .map(|method| method.to_uppercase())
                            .collect()
                    })
                    .unwrap_or_default();
                if listed.is_empty() && name == "api_view" {
                    methods.push("GET".to_string());
                } else {
                    methods.extend(listed);
                }
            }
            "require_GET" => methods.push("GET".to_string()),
            "require_POST" => methods.push("POST".to_string()),
            "require_safe" => methods.extend(["GET".to_string(), "HEAD".to_string()]),
            _ => {}
        }

        let descriptor = match &arguments {
            Some(call) => {
                let args = call
                    .positional
                    .iter()
                    .map(|node| compact(extract_text(node, source)))
                    .chain(call.keywords.iter().map(|(key, value)| {
                        format!("{key}={}", compact(extract_text(value, source)))
                    }))
                    .collect::<Vec<_>>()
                    .join(", ");
                AttributeDescriptor::typed("decorator").with_default(args)
            }
            None => AttributeDescriptor::typed("decorator"),
        };
        entity.push_attribute(format!("@{name}"), descriptor);
    }
    methods
}

/// Models and serializers a view touches in its body: `Order.objects...`,
/// `get_object_or_404(Order, ...)` and `OrderSerializer(...)`.
fn push_usages(entity: &mut RawEntity, node: TSNode, source: &[u8]) {
    let mut declared: BTreeSet<(LinkKind, String)> = entity
        .relations()
        .map(|(_, _, relation)| (relation.kind, relation.target.clone()))
        .collect();

    let mut found = Vec::new();
    collect_usages(node, source, &mut found);

    for (kind, target) in found {
        if declared.insert((kind, target.clone())) {
            let attribute = match kind {
                LinkKind::HandlerUsesSerializer => "uses_serializer",
                _ => "uses_model",
            };
            entity.push_attribute(attribute, AttributeDescriptor::reference(target, kind));
        }
    }
}

fn collect_usages(node: TSNode, source: &[u8], found: &mut Vec<(LinkKind, String)>) {
    match node.kind() {
        "attribute" => {
            let is_manager = node
                .child_by_field_name("attribute")
                .map(|attr| extract_text(&attr, source) == "objects")
                .unwrap_or(false);
            if let Some(object) = node.child_by_field_name("object") {
                if is_manager && object.kind() == "identifier" {
                    let model = extract_text(&object, source);
                    if model.starts_with(|c: char| c.is_ascii_uppercase()) {
                        found.push((LinkKind::HandlerUsesModel, model.to_string()));
                    }
                }
            }
        }
        "call" => {
            if let Some(call) = CallParts::parse(node, source) {
                if matches!(call.callee.as_str(), "get_object_or_404" | "get_list_or_404") {
                    if let Some(model) = call.positional.first().filter(|n| n.kind() == "identifier")
                    {
                        found.push((LinkKind::HandlerUsesModel, extract_text(model, source).to_string()));
                    }
                } else if !call.callee.contains('.')
                    && call.callee.ends_with("Serializer")
                    && call.callee.starts_with(|c: char| c.is_ascii_uppercase())
                {
                    found.push((LinkKind::HandlerUsesSerializer, call.callee.clone()));
                }
            }
        }
        _ => {}
    }

    for child in named_children(node) {
        collect_usages(child, source, found);
    }
}
