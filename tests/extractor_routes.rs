use django_context::core::{DiagnosticKind, EntityKind, FileRole, LinkKind, RawEntity};
use django_context::parsers::{EntityExtractor, ExtractionResult};

fn extract(path: &str, source: &str) -> ExtractionResult {
    EntityExtractor::new()
        .extract(path, source, &[FileRole::Route])
        .unwrap()
}

fn route<'a>(result: &'a ExtractionResult, name: &str) -> &'a RawEntity {
    result
        .entities
        .iter()
        .find(|entity| entity.name == name)
        .unwrap_or_else(|| panic!("no route named {name}"))
}

fn handler_of(entity: &RawEntity) -> Option<&str> {
    entity
        .attribute("handler")
        .and_then(|handler| handler.relation.as_ref())
        .map(|relation| relation.target.as_str())
}

const URLS: &str = r#"from django.urls import include, path, re_path
from rest_framework.routers import DefaultRouter

from . import views
from .views import OrderDetail

router = DefaultRouter()
router.register(r"orders", views.OrderViewSet, basename="order")

urlpatterns = [
    path("", views.home, name="home"),
    path("orders/<int:pk>/", OrderDetail.as_view(), name="order-detail"),
    re_path(r"^legacy/$", "shop.views.legacy_index"),
    path("api/", include(router.urls)),
]

urlpatterns += [
    path("checkout/", views.checkout),
]
"#;

#[test]
fn url_patterns_and_registrations_become_routes() {
    let result = extract("shop/urls.py", URLS);
    assert!(result.diagnostics.is_empty());

    let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "orders",
            "/",
            "orders/<int:pk>/",
            "^legacy/$",
            "api/",
            "checkout/"
        ]
    );
    assert!(result.entities.iter().all(|e| e.kind == EntityKind::Route));
    let orders: Vec<_> = result.entities.iter().map(|e| e.order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn handler_references_are_normalized() {
    let result = extract("shop/urls.py", URLS);

    let home = route(&result, "/");
    assert_eq!(handler_of(home), Some("home"));
    assert_eq!(home.attribute("name").unwrap().default.as_deref(), Some("home"));
    assert_eq!(
        home.attribute("pattern").unwrap().type_hint.as_deref(),
        Some("path")
    );

    let detail = route(&result, "orders/<int:pk>/");
    assert_eq!(handler_of(detail), Some("OrderDetail"));
    let handler = detail.attribute("handler").unwrap();
    assert_eq!(handler.default.as_deref(), Some("OrderDetail.as_view()"));
    assert_eq!(
        handler.relation.as_ref().unwrap().kind,
        LinkKind::RouteBindsHandler
    );

    assert_eq!(handler_of(route(&result, "^legacy/$")), Some("legacy_index"));
    assert_eq!(handler_of(route(&result, "checkout/")), Some("checkout"));
}

#[test]
fn includes_and_router_registrations_are_recorded() {
    let result = extract("shop/urls.py", URLS);

    let api = route(&result, "api/");
    assert!(api.attribute("handler").is_none());
    assert_eq!(
        api.attribute("include").unwrap().default.as_deref(),
        Some("router.urls")
    );

    let registered = route(&result, "orders");
    assert_eq!(registered.line, 8);
    assert_eq!(handler_of(registered), Some("OrderViewSet"));
    assert_eq!(
        registered.attribute("pattern").unwrap().type_hint.as_deref(),
        Some("router.register")
    );
    assert_eq!(
        registered.attribute("name").unwrap().default.as_deref(),
        Some("order")
    );
}

#[test]
fn routes_without_a_view_are_partial() {
    let source = r#"from django.urls import path

urlpatterns = [
    path("broken/"),
]
"#;
    let result = extract("shop/urls.py", source);
    assert_eq!(result.entities.len(), 1);
    assert!(result.entities[0].parse_incomplete);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::ParseIncomplete);
}

#[test]
fn repeated_root_includes_are_kept_without_diagnostics() {
    let source = r#"from django.urls import include, path

urlpatterns = [
    path("", include("shop.urls")),
    path("", include("blog.urls")),
]
"#;
    let result = extract("site/urls.py", source);
    assert!(result.diagnostics.is_empty());

    let ids: Vec<_> = result.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["route:site/urls.py:/", "route:site/urls.py:/#1"]);
    assert!(result.entities.iter().all(|e| !e.parse_incomplete));

    let includes: Vec<_> = result
        .entities
        .iter()
        .filter_map(|e| e.attribute("include"))
        .filter_map(|attr| attr.default.as_deref())
        .collect();
    assert_eq!(includes, vec!["shop.urls", "blog.urls"]);
}
