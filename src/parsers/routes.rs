use tree_sitter::Node as TSNode;

use super::common::{
    compact, extract_text, last_segment, line_of, named_children, reference_name, string_value,
    Assignment, CallParts,
};
use super::{EntitySink, SourceFile};
use crate::core::{AttributeDescriptor, DiagnosticKind, EntityKind, LinkKind, RawEntity};

const ROUTE_FUNCTIONS: &[&str] = &["path", "re_path", "url"];

/// Extracts `urlpatterns` entries and router registrations.
pub fn extract(file: &SourceFile, root: TSNode, sink: &mut EntitySink) {
    for statement in named_children(root) {
        if statement.kind() != "expression_statement" {
            continue;
        }

        if let Some(assignment) = Assignment::parse(statement, file.source) {
            if assignment.target == "urlpatterns" {
                if let Some(value) = assignment.value {
                    for list in pattern_lists(value) {
                        extract_pattern_list(file, list, sink);
                    }
                }
            }
            continue;
        }

        if let Some(call) = statement
            .named_child(0)
            .and_then(|expr| CallParts::parse(expr, file.source))
        {
            if is_router_register(&call.callee) {
                extract_registration(file, statement, &call, sink);
            }
        }
    }
}

/// List literals inside `[...]`, `[...] + [...]` and `[...] + static(...)`.
fn pattern_lists(value: TSNode) -> Vec<TSNode> {
    match value.kind() {
        "list" => vec![value],
        "binary_operator" => named_children(value)
            .into_iter()
            .flat_map(pattern_lists)
            .collect(),
        "parenthesized_expression" => named_children(value)
            .into_iter()
            .flat_map(pattern_lists)
            .collect(),
        _ => Vec::new(),
    }
}

fn extract_pattern_list(file: &SourceFile, list: TSNode, sink: &mut EntitySink) {
    for element in named_children(list) {
        let Some(call) = CallParts::parse(element, file.source) else {
            continue;
        };
        if !ROUTE_FUNCTIONS.contains(&call.callee_name()) {
            continue;
        }

        let pattern = call
            .argument("route", 0)
            .and_then(|node| string_value(&node, file.source));
        let Some(pattern) = pattern else {
            sink.diagnose(
                DiagnosticKind::ParseIncomplete,
                format!(
                    "{}() at line {} has no literal pattern",
                    call.callee_name(),
                    line_of(&element)
                ),
            );
            continue;
        };

        let mut entity = RawEntity::new(
            EntityKind::Route,
            route_name(&pattern),
            file.path.to_string(),
            line_of(&element),
        )
        .with_attribute(
            "pattern",
            AttributeDescriptor::typed(call.callee_name()).with_default(pattern),
        );

        match call.argument("view", 1) {
            Some(view) => push_view(&mut entity, view, file.source),
            None => {
                entity.mark_incomplete();
                sink.diagnose(
                    DiagnosticKind::ParseIncomplete,
                    format!("route `{}` has no view", entity.name),
                );
            }
        }

        if let Some(name) = call
            .keyword("name")
            .and_then(|node| string_value(&node, file.source))
        {
            entity.push_attribute("name", AttributeDescriptor::literal(name));
        }

        sink.check_complete(&mut entity, element);
        sink.push_repeatable(entity);
    }
}

/// Records the view an entry points at: a function, a class-based view via
/// `as_view()`, or an `include(...)` of another URL module.
fn push_view(entity: &mut RawEntity, view: TSNode, source: &[u8]) {
    if let Some(call) = CallParts::parse(view, source) {
        match call.callee_name() {
            "include" => {
                let target = call
                    .positional
                    .first()
                    .map(|node| {
                        string_value(node, source)
                            .unwrap_or_else(|| compact(extract_text(node, source)))
                    })
                    .unwrap_or_default();
                entity.push_attribute("include", AttributeDescriptor::literal(target));
                return;
            }
            "as_view" => {
                let class = call
                    .callee
                    .strip_suffix(".as_view")
                    .map(|object| last_segment(object).to_string());
                if let Some(class) = class {
                    entity.push_attribute(
                        "handler",
                        AttributeDescriptor::reference(class, LinkKind::RouteBindsHandler)
                            .with_default(compact(extract_text(&view, source))),
                    );
                    return;
                }
            }
            _ => {}
        }
    }

    match reference_name(&view, source) {
        Some(handler) if view.kind() != "string" => entity.push_attribute(
            "handler",
            AttributeDescriptor::reference(handler, LinkKind::RouteBindsHandler),
        ),
        // Old-style string views: "app.views.name"
        Some(handler) => entity.push_attribute(
            "handler",
            AttributeDescriptor::reference(handler, LinkKind::RouteBindsHandler)
                .with_default(compact(extract_text(&view, source))),
        ),
        None => entity.push_attribute(
            "handler",
            AttributeDescriptor::literal(compact(extract_text(&view, source))),
        ),
    }
}

fn is_router_register(callee: &str) -> bool {
    match callee.rsplit_once('.') {
        Some((object, "register")) => last_segment(object).to_lowercase().ends_with("router"),
        _ => false,
    }
}

fn extract_registration(
    file: &SourceFile,
    statement: TSNode,
    call: &CallParts,
    sink: &mut EntitySink,
) {
    let prefix = call
        .argument("prefix", 0)
        .and_then(|node| string_value(&node, file.source));
    let Some(prefix) = prefix else {
        sink.diagnose(
            DiagnosticKind::ParseIncomplete,
            format!(
                "{}() at line {} has no literal prefix",
                call.callee,
                line_of(&statement)
            ),
        );
        return;
    };

    let mut entity = RawEntity::new(
        EntityKind::Route,
        route_name(&prefix),
        file.path.to_string(),
        line_of(&statement),
    )
    .with_attribute(
        "pattern",
        AttributeDescriptor::typed("router.register").with_default(prefix),
    );

    match call
        .argument("viewset", 1)
        .and_then(|node| reference_name(&node, file.source))
    {
        Some(viewset) => entity.push_attribute(
            "handler",
            AttributeDescriptor::reference(viewset, LinkKind::RouteBindsHandler),
        ),
        None => {
            entity.mark_incomplete();
            sink.diagnose(
                DiagnosticKind::ParseIncomplete,
                format!("router registration `{}` has no viewset", entity.name),
            );
        }
    }

    if let Some(basename) = call
        .keyword("basename")
        .and_then(|node| string_value(&node, file.source))
    {
        entity.push_attribute("name", AttributeDescriptor::literal(basename));
    }

    sink.check_complete(&mut entity, statement);
    sink.push_repeatable(entity);
}

/// The root pattern `""` is named `/`.
fn route_name(pattern: &str) -> String {
    if pattern.is_empty() {
        "/".to_string()
    } else {
        pattern.to_string()
    }
}
