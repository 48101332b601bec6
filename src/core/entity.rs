use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a [`RawEntity`]: `"<kind>:<source-file>:<name>"`.
pub type EntityId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Model,
    Route,
    Handler,
    Serializer,
    Migration,
    Other,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Route => "route",
            EntityKind::Handler => "handler",
            EntityKind::Serializer => "serializer",
            EntityKind::Migration => "migration",
            EntityKind::Other => "other",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    ForeignKey,
    OneToOne,
    ManyToMany,
    Inherits,
    RouteBindsHandler,
    SerializerWrapsModel,
    SerializerNests,
    HandlerUsesModel,
    HandlerUsesSerializer,
    MigrationDependsOn,
    MigrationTouchesModel,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::ForeignKey => "foreign-key",
            LinkKind::OneToOne => "one-to-one",
            LinkKind::ManyToMany => "many-to-many",
            LinkKind::Inherits => "inherits",
            LinkKind::RouteBindsHandler => "route-binds-handler",
            LinkKind::SerializerWrapsModel => "serializer-wraps-model",
            LinkKind::SerializerNests => "serializer-nests",
            LinkKind::HandlerUsesModel => "handler-uses-model",
            LinkKind::HandlerUsesSerializer => "handler-uses-serializer",
            LinkKind::MigrationDependsOn => "migration-depends-on",
            LinkKind::MigrationTouchesModel => "migration-touches-model",
        }
    }

    /// Entity kind a reference of this link kind is expected to land on.
    /// Inheritance stays within the kind of the declaring entity.
    pub fn preferred_target(self, source: EntityKind) -> EntityKind {
        match self {
            LinkKind::ForeignKey
            | LinkKind::OneToOne
            | LinkKind::ManyToMany
            | LinkKind::SerializerWrapsModel
            | LinkKind::HandlerUsesModel
            | LinkKind::MigrationTouchesModel => EntityKind::Model,
            LinkKind::RouteBindsHandler => EntityKind::Handler,
            LinkKind::SerializerNests | LinkKind::HandlerUsesSerializer => EntityKind::Serializer,
            LinkKind::MigrationDependsOn => EntityKind::Migration,
            LinkKind::Inherits => source,
        }
    }

    /// Relation kind implied by a Django field constructor name.
    pub fn for_field_type(field_type: &str) -> Option<Self> {
        match field_type {
            "ForeignKey" | "ParentalKey" => Some(LinkKind::ForeignKey),
            "OneToOneField" => Some(LinkKind::OneToOne),
            "ManyToManyField" | "ParentalManyToManyField" => Some(LinkKind::ManyToMany),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unresolved, by-name reference to another entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub target: String,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub type_hint: Option<String>,
    pub default: Option<String>,
    pub relation: Option<Relation>,
}

impl AttributeDescriptor {
    pub fn typed(type_hint: impl Into<String>) -> Self {
        Self {
            type_hint: Some(type_hint.into()),
            ..Self::default()
        }
    }

    /// Descriptor carrying only a literal value, e.g. `Meta.ordering`.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            default: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn reference(target: impl Into<String>, kind: LinkKind) -> Self {
        Self::default().with_relation(target, kind)
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_relation(mut self, target: impl Into<String>, kind: LinkKind) -> Self {
        self.relation = Some(Relation {
            target: target.into(),
            kind,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub descriptor: AttributeDescriptor,
}

/// A single declared construct extracted from exactly one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub source_file: String,
    pub line: usize,
    pub order: usize,
    pub attributes: Vec<Attribute>,
    pub parse_incomplete: bool,
}

impl RawEntity {
    pub fn new(kind: EntityKind, name: String, source_file: String, line: usize) -> Self {
        Self {
            id: entity_id(kind, &source_file, &name),
            kind,
            name,
            source_file,
            line,
            order: 0,
            attributes: Vec::new(),
            parse_incomplete: false,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, descriptor: AttributeDescriptor) -> Self {
        self.push_attribute(name, descriptor);
        self
    }

    pub fn push_attribute(&mut self, name: impl Into<String>, descriptor: AttributeDescriptor) {
        self.attributes.push(Attribute {
            name: name.into(),
            descriptor,
        });
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.descriptor)
    }

    /// Renames the entity, keeping its id in sync.
    pub fn rename(&mut self, name: String) {
        self.id = entity_id(self.kind, &self.source_file, &name);
        self.name = name;
    }

    pub fn mark_incomplete(&mut self) {
        self.parse_incomplete = true;
    }

    /// Attributes that carry a by-name reference, in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (usize, &Attribute, &Relation)> {
        self.attributes
            .iter()
            .enumerate()
            .filter_map(|(pos, attr)| attr.descriptor.relation.as_ref().map(|rel| (pos, attr, rel)))
    }
}

pub fn entity_id(kind: EntityKind, source_file: &str, name: &str) -> EntityId {
    format!("{}:{}:{}", kind.as_str(), source_file, name)
}
