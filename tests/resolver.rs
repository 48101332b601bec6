use django_context::config::TieBreak;
use django_context::core::{
    AttributeDescriptor, Confidence, DiagnosticKind, EntityKind, LinkKind, RawEntity,
    ReferenceResolver,
};

fn entity(kind: EntityKind, file: &str, name: &str, order: usize) -> RawEntity {
    let mut entity = RawEntity::new(kind, name.to_string(), file.to_string(), order + 1);
    entity.order = order;
    entity
}

fn order_with_customer_fk() -> RawEntity {
    entity(EntityKind::Model, "shop/models.py", "Order", 0).with_attribute(
        "customer",
        AttributeDescriptor::typed("ForeignKey").with_relation("Customer", LinkKind::ForeignKey),
    )
}

#[test]
fn reference_to_existing_entity_resolves() {
    let entities = vec![
        order_with_customer_fk(),
        entity(EntityKind::Model, "crm/models.py", "Customer", 0),
    ];
    let resolution = ReferenceResolver::default().resolve(&entities);

    assert_eq!(resolution.links.len(), 1);
    let link = &resolution.links[0];
    assert_eq!(link.source, "model:shop/models.py:Order");
    assert_eq!(link.target.as_deref(), Some("model:crm/models.py:Customer"));
    assert_eq!(link.reference, "Customer");
    assert_eq!(link.attribute, "customer");
    assert_eq!(link.kind, LinkKind::ForeignKey);
    assert_eq!(link.confidence, Confidence::Resolved);
    assert_eq!(link.candidates, 1);
    assert!(resolution.diagnostics.is_empty());
}

#[test]
fn dangling_reference_is_unresolved_not_dropped() {
    let entities = vec![order_with_customer_fk()];
    let resolution = ReferenceResolver::default().resolve(&entities);

    assert_eq!(resolution.links.len(), 1);
    assert_eq!(resolution.links[0].confidence, Confidence::Unresolved);
    assert_eq!(resolution.links[0].target, None);
    assert_eq!(resolution.links[0].candidates, 0);

    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].kind, DiagnosticKind::Unresolved);
    assert_eq!(resolution.diagnostics[0].file, "shop/models.py");
}

fn ambiguous_fixture() -> Vec<RawEntity> {
    vec![
        entity(EntityKind::Serializer, "shop/serializers.py", "OrderSerializer", 0).with_attribute(
            "Meta.model",
            AttributeDescriptor::reference("Order", LinkKind::SerializerWrapsModel),
        ),
        entity(EntityKind::Model, "shop/models.py", "Order", 0),
        entity(EntityKind::Handler, "archive/views.py", "Order", 0),
    ]
}

#[test]
fn ambiguous_reference_prefers_expected_kind() {
    let resolution = ReferenceResolver::new(TieBreak::RolePreference).resolve(&ambiguous_fixture());

    assert_eq!(resolution.links.len(), 1);
    let link = &resolution.links[0];
    assert_eq!(link.confidence, Confidence::Ambiguous);
    assert_eq!(link.candidates, 2);
    assert_eq!(link.target.as_deref(), Some("model:shop/models.py:Order"));

    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].kind, DiagnosticKind::Ambiguous);
}

#[test]
fn path_order_tie_break_ignores_kind() {
    let resolution = ReferenceResolver::new(TieBreak::PathOrder).resolve(&ambiguous_fixture());
    assert_eq!(
        resolution.links[0].target.as_deref(),
        Some("handler:archive/views.py:Order")
    );
}

#[test]
fn same_file_candidate_wins_among_equal_kinds() {
    let entities = vec![
        entity(EntityKind::Model, "blog/models.py", "Base", 0),
        entity(EntityKind::Model, "shop/models.py", "Base", 0),
        entity(EntityKind::Model, "shop/models.py", "Product", 1).with_attribute(
            "base",
            AttributeDescriptor::reference("Base", LinkKind::Inherits),
        ),
    ];
    let resolution = ReferenceResolver::default().resolve(&entities);
    assert_eq!(
        resolution.links[0].target.as_deref(),
        Some("model:shop/models.py:Base")
    );
}

#[test]
fn resolution_is_independent_of_input_order() {
    let mut entities = ambiguous_fixture();
    entities.push(order_with_customer_fk());
    entities.push(entity(EntityKind::Model, "crm/models.py", "Customer", 0));
    entities.push(
        entity(EntityKind::Route, "shop/urls.py", "checkout/", 0).with_attribute(
            "handler",
            AttributeDescriptor::reference("checkout", LinkKind::RouteBindsHandler),
        ),
    );

    let resolver = ReferenceResolver::default();
    let expected = resolver.resolve(&entities);

    for rotation in 1..entities.len() {
        let mut shuffled = entities.clone();
        shuffled.rotate_left(rotation);
        shuffled.reverse();
        let resolution = resolver.resolve(&shuffled);
        assert_eq!(resolution.links, expected.links);
        assert_eq!(resolution.diagnostics, expected.diagnostics);
    }
}

#[test]
fn migration_model_names_match_case_insensitively() {
    let migration = entity(EntityKind::Migration, "shop/migrations/0002_order_note.py", "shop.0002_order_note", 0)
        .with_attribute(
            "operations[0]",
            AttributeDescriptor::typed("AddField")
                .with_relation("order", LinkKind::MigrationTouchesModel),
        );
    let lowercase_fk = entity(EntityKind::Model, "shop/models.py", "Invoice", 1).with_attribute(
        "order",
        AttributeDescriptor::typed("ForeignKey").with_relation("order", LinkKind::ForeignKey),
    );
    let entities = vec![
        migration,
        lowercase_fk,
        entity(EntityKind::Model, "shop/models.py", "Order", 0),
    ];
    let resolution = ReferenceResolver::default().resolve(&entities);

    let touch = resolution
        .links
        .iter()
        .find(|link| link.kind == LinkKind::MigrationTouchesModel)
        .unwrap();
    assert_eq!(touch.confidence, Confidence::Resolved);
    assert_eq!(touch.target.as_deref(), Some("model:shop/models.py:Order"));

    let fk = resolution
        .links
        .iter()
        .find(|link| link.kind == LinkKind::ForeignKey)
        .unwrap();
    assert_eq!(fk.confidence, Confidence::Unresolved);
}

#[test]
fn migration_model_names_skip_same_named_non_models() {
    let migration = entity(EntityKind::Migration, "shop/migrations/0002_order_note.py", "shop.0002_order_note", 0)
        .with_attribute(
            "operations[0]",
            AttributeDescriptor::typed("AddField")
                .with_relation("order", LinkKind::MigrationTouchesModel),
        );
    let entities = vec![
        migration,
        entity(EntityKind::Handler, "shop/views.py", "order", 0),
        entity(EntityKind::Model, "shop/models.py", "Order", 0),
    ];
    let resolution = ReferenceResolver::default().resolve(&entities);

    assert_eq!(resolution.links.len(), 1);
    let touch = &resolution.links[0];
    assert_eq!(touch.confidence, Confidence::Resolved);
    assert_eq!(touch.target.as_deref(), Some("model:shop/models.py:Order"));
    assert_eq!(touch.candidates, 1);
    assert!(resolution.diagnostics.is_empty());
}

#[test]
fn migration_touching_only_a_non_model_is_unresolved() {
    let migration = entity(EntityKind::Migration, "shop/migrations/0003_drop.py", "shop.0003_drop", 0)
        .with_attribute(
            "operations[0]",
            AttributeDescriptor::typed("DeleteModel")
                .with_relation("order", LinkKind::MigrationTouchesModel),
        );
    let entities = vec![migration, entity(EntityKind::Handler, "shop/views.py", "order", 0)];
    let resolution = ReferenceResolver::default().resolve(&entities);

    assert_eq!(resolution.links[0].confidence, Confidence::Unresolved);
    assert_eq!(resolution.links[0].target, None);
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].kind, DiagnosticKind::Unresolved);
}
