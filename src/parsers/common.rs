use tree_sitter::{Node as TSNode, Parser, Tree};

use crate::error::{AnalysisError, Result};

/// Thin wrapper over a tree-sitter parser loaded with the Python grammar.
pub struct TreeSitterParser {
    parser: Parser,
}

impl TreeSitterParser {
    pub fn python() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(tree_sitter_python::language())
            .map_err(|err| AnalysisError::Grammar(err.to_string()))?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::Grammar("parser produced no syntax tree".to_string()))
    }
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

pub fn line_of(node: &TSNode) -> usize {
    node.start_position().row + 1
}

pub fn named_children<'tree>(node: TSNode<'tree>) -> Vec<TSNode<'tree>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// `a.b.Model` -> `Model`
pub fn last_segment(dotted: &str) -> &str {
    dotted.rsplit('.').next().unwrap_or(dotted).trim()
}

/// Line of the first syntax error or missing token under `node`.
pub fn first_error_line(node: TSNode) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(&node));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_line)
}

/// Value of a Python string literal with prefixes and quotes removed.
pub fn string_value(node: &TSNode, source: &[u8]) -> Option<String> {
    match node.kind() {
        "string" => Some(unquote(extract_text(node, source))),
        "concatenated_string" => Some(
            named_children(*node)
                .iter()
                .filter_map(|part| string_value(part, source))
                .collect(),
        ),
        _ => None,
    }
}

fn unquote(literal: &str) -> String {
    let body = literal.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= quote.len() * 2 && body.starts_with(quote) && body.ends_with(quote) {
            return body[quote.len()..body.len() - quote.len()].to_string();
        }
    }
    body.to_string()
}

/// Name an expression refers to: string literals lose their app label
/// (`"shop.Customer"` -> `Customer`), dotted paths keep their last segment.
pub fn reference_name(node: &TSNode, source: &[u8]) -> Option<String> {
    let name = match node.kind() {
        "string" | "concatenated_string" => string_value(node, source)?,
        "identifier" | "attribute" => extract_text(node, source).to_string(),
        _ => return None,
    };
    let name = last_segment(&name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Leftmost identifier of an attribute/call chain, e.g. `Order` for
/// `Order.objects.filter(active=True)`.
pub fn root_identifier<'a>(node: &TSNode, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "identifier" => Some(extract_text(node, source)),
        "attribute" => root_identifier(&node.child_by_field_name("object")?, source),
        "call" => root_identifier(&node.child_by_field_name("function")?, source),
        "subscript" => root_identifier(&node.child_by_field_name("value")?, source),
        _ => None,
    }
}

/// A call expression split into callee text, positional and keyword arguments.
pub struct CallParts<'tree> {
    pub callee: String,
    pub positional: Vec<TSNode<'tree>>,
    pub keywords: Vec<(String, TSNode<'tree>)>,
}

impl<'tree> CallParts<'tree> {
    pub fn parse(node: TSNode<'tree>, source: &[u8]) -> Option<Self> {
        if node.kind() != "call" {
            return None;
        }
        let callee = extract_text(&node.child_by_field_name("function")?, source).to_string();
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            for arg in named_children(arguments) {
                match arg.kind() {
                    "keyword_argument" => {
                        if let (Some(name), Some(value)) = (
                            arg.child_by_field_name("name"),
                            arg.child_by_field_name("value"),
                        ) {
                            keywords.push((extract_text(&name, source).to_string(), value));
                        }
                    }
                    "comment" => {}
                    _ => positional.push(arg),
                }
            }
        }
        Some(Self {
            callee,
            positional,
            keywords,
        })
    }

    pub fn callee_name(&self) -> &str {
        last_segment(&self.callee)
    }

    pub fn keyword(&self, name: &str) -> Option<TSNode<'tree>> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Keyword argument if present, otherwise the positional argument at `index`.
    pub fn argument(&self, keyword: &str, index: usize) -> Option<TSNode<'tree>> {
        self.keyword(keyword)
            .or_else(|| self.positional.get(index).copied())
    }
}

/// A top-level or class-level definition with its decorators unwrapped.
pub struct Definition<'tree> {
    pub node: TSNode<'tree>,
    pub decorators: Vec<TSNode<'tree>>,
}

/// Definitions of the given node kinds directly under `parent` (a module or
/// a class body) in source order, looking through `@decorator` wrappers.
pub fn definitions<'tree>(parent: TSNode<'tree>, kinds: &[&str]) -> Vec<Definition<'tree>> {
    let mut found = Vec::new();
    for child in named_children(parent) {
        if kinds.contains(&child.kind()) {
            found.push(Definition {
                node: child,
                decorators: Vec::new(),
            });
        } else if child.kind() == "decorated_definition" {
            let Some(definition) = child.child_by_field_name("definition") else {
                continue;
            };
            if kinds.contains(&definition.kind()) {
                let decorators = named_children(child)
                    .into_iter()
                    .filter(|node| node.kind() == "decorator")
                    .collect();
                found.push(Definition {
                    node: definition,
                    decorators,
                });
            }
        }
    }
    found
}

pub fn definition_name(node: &TSNode, source: &[u8]) -> Option<String> {
    node.child_by_field_name("name")
        .map(|name| extract_text(&name, source).to_string())
        .filter(|name| !name.is_empty())
}

/// Decorator expression without the `@`, e.g. `api_view(["GET"])`.
pub fn decorator_expression<'tree>(decorator: TSNode<'tree>) -> Option<TSNode<'tree>> {
    named_children(decorator).into_iter().next()
}

/// Superclass expressions of a class, skipping `metaclass=` style keywords.
pub fn base_classes(class_node: &TSNode, source: &[u8]) -> Vec<String> {
    let Some(superclasses) = class_node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    named_children(superclasses)
        .iter()
        .filter(|arg| matches!(arg.kind(), "identifier" | "attribute"))
        .map(|arg| extract_text(arg, source).to_string())
        .collect()
}

/// Statements of a class or function body.
pub fn body_statements<'tree>(definition: TSNode<'tree>) -> Vec<TSNode<'tree>> {
    definition
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default()
}

/// `name = value` or `name += value` carried by an expression statement.
pub struct Assignment<'tree> {
    pub target: String,
    pub value: Option<TSNode<'tree>>,
}

impl<'tree> Assignment<'tree> {
    pub fn parse(statement: TSNode<'tree>, source: &[u8]) -> Option<Self> {
        if statement.kind() != "expression_statement" {
            return None;
        }
        let inner = statement.named_child(0)?;
        if !matches!(inner.kind(), "assignment" | "augmented_assignment") {
            return None;
        }
        let left = inner.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        Some(Self {
            target: extract_text(&left, source).to_string(),
            value: inner.child_by_field_name("right"),
        })
    }
}

/// Collapses runs of whitespace so multi-line literals stay on one line.
pub fn compact(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bases provided by Django or Django REST framework; inheriting from them
/// does not create a link to a project entity.
const FRAMEWORK_BASES: &[&str] = &[
    "object",
    "Model",
    "AbstractUser",
    "AbstractBaseUser",
    "Migration",
    "View",
    "TemplateView",
    "RedirectView",
    "ListView",
    "DetailView",
    "CreateView",
    "UpdateView",
    "DeleteView",
    "FormView",
    "APIView",
    "GenericAPIView",
    "ListAPIView",
    "CreateAPIView",
    "RetrieveAPIView",
    "UpdateAPIView",
    "DestroyAPIView",
    "ListCreateAPIView",
    "RetrieveUpdateAPIView",
    "RetrieveDestroyAPIView",
    "RetrieveUpdateDestroyAPIView",
    "ViewSet",
    "GenericViewSet",
    "ModelViewSet",
    "ReadOnlyModelViewSet",
    "Serializer",
    "ModelSerializer",
    "HyperlinkedModelSerializer",
    "ListSerializer",
];

const FRAMEWORK_MODULES: &[&str] = &[
    "models",
    "views",
    "generic",
    "generics",
    "viewsets",
    "mixins",
    "serializers",
    "migrations",
    "forms",
    "admin",
];

pub fn is_framework_base(base: &str) -> bool {
    let head = base.split('.').next().unwrap_or(base);
    let name = last_segment(base);
    (base.contains('.') && FRAMEWORK_MODULES.contains(&head))
        || FRAMEWORK_BASES.contains(&name)
        || name.ends_with("Mixin")
}
