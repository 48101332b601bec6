use django_context::core::{
    AttributeDescriptor, ContextBuilder, EntityKind, FileRecord, FileRole, LinkKind, RawEntity,
    ReferenceResolver, ScanStatus, FORMAT_VERSION,
};

fn record(path: &str, roles: &[FileRole]) -> FileRecord {
    FileRecord {
        path: path.to_string(),
        fingerprint: Some(format!("fp-{path}")),
        roles: roles.to_vec(),
        previous_fingerprint: None,
        status: ScanStatus::ReExtracted,
    }
}

fn fixture() -> (Vec<FileRecord>, Vec<RawEntity>) {
    let order = RawEntity::new(
        EntityKind::Model,
        "Order".to_string(),
        "shop/models.py".to_string(),
        4,
    )
    .with_attribute(
        "customer",
        AttributeDescriptor::typed("ForeignKey").with_relation("Customer", LinkKind::ForeignKey),
    );
    let customer = RawEntity::new(
        EntityKind::Model,
        "Customer".to_string(),
        "crm/models.py".to_string(),
        4,
    );
    let files = vec![
        record("shop/models.py", &[FileRole::Model]),
        record("crm/models.py", &[FileRole::Model]),
    ];
    (files, vec![order, customer])
}

#[test]
fn foreign_key_between_two_model_files() {
    let (files, entities) = fixture();
    let resolution = ReferenceResolver::default().resolve(&entities);
    let graph = ContextBuilder::new("shop").build(&files, &entities, &resolution.links);

    assert_eq!(graph.format_version, FORMAT_VERSION);
    assert_eq!(graph.project, "shop");
    assert_eq!(graph.entities.len(), 2);
    assert_eq!(graph.links.len(), 1);
    assert_eq!(graph.links[0].kind, LinkKind::ForeignKey);

    let customer = graph.entity("model:crm/models.py:Customer").unwrap();
    let order = graph.entity("model:shop/models.py:Order").unwrap();
    assert_eq!(customer.fan_in, 1);
    assert_eq!(customer.fan_out, 0);
    assert_eq!(order.fan_in, 0);
    assert_eq!(order.fan_out, 1);
    assert_eq!(graph.orphans().count(), 0);
    assert_eq!(graph.totals.orphans, 0);
    assert_eq!(graph.totals.resolved, 1);
    assert_eq!(graph.totals.entities_by_kind.get(&EntityKind::Model), Some(&2));
}

#[test]
fn entities_and_files_are_sorted() {
    let (files, entities) = fixture();
    let resolution = ReferenceResolver::default().resolve(&entities);
    let graph = ContextBuilder::new("shop").build(&files, &entities, &resolution.links);

    let ids: Vec<_> = graph.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["model:crm/models.py:Customer", "model:shop/models.py:Order"]
    );
    let paths: Vec<_> = graph.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["crm/models.py", "shop/models.py"]);
    assert!(graph.files.iter().all(|f| f.entities == 1 && f.readable));
}

#[test]
fn unresolved_links_count_only_as_fan_out() {
    let route = RawEntity::new(
        EntityKind::Route,
        "orders/submit/".to_string(),
        "shop/urls.py".to_string(),
        5,
    )
    .with_attribute(
        "handler",
        AttributeDescriptor::reference("submit_order", LinkKind::RouteBindsHandler),
    );
    let lonely = RawEntity::new(
        EntityKind::Model,
        "AuditLog".to_string(),
        "audit/models.py".to_string(),
        3,
    );
    let entities = vec![route, lonely];
    let resolution = ReferenceResolver::default().resolve(&entities);
    let graph = ContextBuilder::new("shop").build(&[], &entities, &resolution.links);

    let route = graph.entity("route:shop/urls.py:orders/submit/").unwrap();
    assert_eq!(route.fan_out, 1);
    assert_eq!(route.fan_in, 0);
    assert!(!route.orphan);

    let orphans: Vec<_> = graph.orphans().map(|e| e.name.as_str()).collect();
    assert_eq!(orphans, vec!["AuditLog"]);
    assert_eq!(graph.totals.unresolved, 1);
    assert_eq!(graph.totals.orphans, 1);
}

#[test]
fn build_is_a_pure_function_of_its_inputs() {
    let (mut files, mut entities) = fixture();
    let resolution = ReferenceResolver::default().resolve(&entities);
    let builder = ContextBuilder::new("shop");
    let expected = builder.build(&files, &entities, &resolution.links);

    files.reverse();
    entities.reverse();
    let mut links = resolution.links.clone();
    links.reverse();
    assert_eq!(builder.build(&files, &entities, &links), expected);

    // Repeated entities are collapsed by id.
    let mut doubled = entities.clone();
    doubled.extend(entities.iter().cloned());
    assert_eq!(builder.build(&files, &doubled, &links), expected);
}
