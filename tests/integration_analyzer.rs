use django_context::config::AnalyzerConfig;
use django_context::core::{CodeAnalyzer, Confidence, DiagnosticKind, EntityKind, LinkKind};
use django_context::error::AnalysisError;
use django_context::formatters::JsonFormatter;
use django_context::parsers::cache::{DiskCache, MemoryCache};
use std::fs;
use std::path::Path;

fn write<P: AsRef<Path>>(path: P, content: &str) {
    let path = path.as_ref();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn analyzer() -> CodeAnalyzer {
    CodeAnalyzer::new(&AnalyzerConfig::default()).unwrap()
}

#[test]
fn order_and_customer_in_separate_model_files() {
    let dir = tempfile::TempDir::new().unwrap();
    write(
        dir.path().join("shop/models.py"),
        r#"from django.db import models


class Order(models.Model):
    customer = models.ForeignKey("crm.Customer", on_delete=models.CASCADE)
"#,
    );
    write(
        dir.path().join("crm/models.py"),
        r#"from django.db import models


class Customer(models.Model):
    name = models.CharField(max_length=100)
"#,
    );

    let output = analyzer().analyze(dir.path(), &MemoryCache::new()).unwrap();
    let graph = &output.graph;

    assert_eq!(graph.entities.len(), 2);
    assert_eq!(graph.links.len(), 1);
    assert_eq!(graph.links[0].kind, LinkKind::ForeignKey);
    assert_eq!(graph.links[0].confidence, Confidence::Resolved);
    assert_eq!(graph.entity("model:crm/models.py:Customer").unwrap().fan_in, 1);
    assert_eq!(graph.entity("model:shop/models.py:Order").unwrap().fan_out, 1);
    assert_eq!(graph.totals.orphans, 0);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn route_to_missing_handler_is_unresolved() {
    let dir = tempfile::TempDir::new().unwrap();
    write(
        dir.path().join("shop/urls.py"),
        r#"from django.urls import path

from . import views

urlpatterns = [
    path("orders/submit/", views.submit_order, name="submit-order"),
]
"#,
    );

    let output = analyzer().analyze(dir.path(), &MemoryCache::new()).unwrap();

    assert_eq!(output.graph.entities.len(), 1);
    assert_eq!(output.graph.entities[0].kind, EntityKind::Route);
    assert_eq!(output.graph.links.len(), 1);
    assert_eq!(output.graph.links[0].confidence, Confidence::Unresolved);
    assert_eq!(output.graph.links[0].target, None);
    assert_eq!(output.graph.links[0].reference, "submit_order");

    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::Unresolved);
    assert_eq!(output.diagnostics[0].file, "shop/urls.py");
}

fn django_project(root: &Path) {
    write(
        root.join("shop/models.py"),
        r#"from django.db import models


class Customer(models.Model):
    name = models.CharField(max_length=100)


class Order(models.Model):
    customer = models.ForeignKey(Customer, on_delete=models.CASCADE)
    total = models.DecimalField(max_digits=10, decimal_places=2)
"#,
    );
    write(
        root.join("shop/serializers.py"),
        r#"from rest_framework import serializers

from .models import Order


class OrderSerializer(serializers.ModelSerializer):
    class Meta:
        model = Order
        fields = ["id", "customer", "total"]
"#,
    );
    write(
        root.join("shop/views.py"),
        r#"from rest_framework import viewsets

from .models import Order
from .serializers import OrderSerializer


class OrderViewSet(viewsets.ModelViewSet):
    queryset = Order.objects.all()
    serializer_class = OrderSerializer
"#,
    );
    write(
        root.join("shop/urls.py"),
        r#"from django.urls import include, path
from rest_framework.routers import DefaultRouter

from .views import OrderViewSet

router = DefaultRouter()
router.register("orders", OrderViewSet)

urlpatterns = [
    path("api/", include(router.urls)),
]
"#,
    );
    write(root.join("shop/migrations/__init__.py"), "");
    write(
        root.join("shop/migrations/0001_initial.py"),
        r#"from django.db import migrations, models


class Migration(migrations.Migration):
    initial = True

    dependencies = []

    operations = [
        migrations.CreateModel(
            name="Customer",
            fields=[("id", models.AutoField(primary_key=True))],
        ),
    ]
"#,
    );
    write(
        root.join("shop/migrations/0002_order_total.py"),
        r#"from django.db import migrations, models


class Migration(migrations.Migration):
    dependencies = [("shop", "0001_initial")]

    operations = [
        migrations.AddField(
            model_name="order",
            name="total",
            field=models.DecimalField(max_digits=10, decimal_places=2),
        ),
    ]
"#,
    );
}

#[test]
fn cross_file_links_of_a_small_django_app() {
    let dir = tempfile::TempDir::new().unwrap();
    django_project(dir.path());

    let output = analyzer().analyze(dir.path(), &MemoryCache::new()).unwrap();
    let graph = &output.graph;
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let kinds: Vec<_> = graph.entities.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Model,
            EntityKind::Model,
            EntityKind::Route,
            EntityKind::Route,
            EntityKind::Handler,
            EntityKind::Serializer,
            EntityKind::Migration,
            EntityKind::Migration,
        ]
    );

    let mut link_kinds: Vec<_> = graph.links.iter().map(|l| l.kind).collect();
    link_kinds.sort();
    assert_eq!(
        link_kinds,
        vec![
            LinkKind::ForeignKey,
            LinkKind::RouteBindsHandler,
            LinkKind::SerializerWrapsModel,
            LinkKind::HandlerUsesModel,
            LinkKind::HandlerUsesSerializer,
            LinkKind::MigrationDependsOn,
            LinkKind::MigrationTouchesModel,
            LinkKind::MigrationTouchesModel,
        ]
    );
    assert!(graph
        .links
        .iter()
        .all(|link| link.confidence == Confidence::Resolved));

    let order = "model:shop/models.py:Order";
    let mut sources: Vec<_> = graph.links_to(order).map(|l| l.source.as_str()).collect();
    sources.sort();
    assert_eq!(
        sources,
        vec![
            "handler:shop/views.py:OrderViewSet",
            "migration:shop/migrations/0002_order_total.py:shop.0002_order_total",
            "serializer:shop/serializers.py:OrderSerializer",
        ]
    );

    let orphans: Vec<_> = graph.orphans().map(|e| e.name.as_str()).collect();
    assert_eq!(orphans, vec!["api/"]);
    assert_eq!(graph.totals.files, 7);
}

#[test]
fn repeated_runs_are_byte_identical_and_fully_cached() {
    let dir = tempfile::TempDir::new().unwrap();
    django_project(dir.path());
    let cache_dir = tempfile::TempDir::new().unwrap();
    let formatter = JsonFormatter::new();

    let first = analyzer()
        .analyze(dir.path(), &DiskCache::new(cache_dir.path()).unwrap())
        .unwrap();
    let second = analyzer()
        .analyze(dir.path(), &DiskCache::new(cache_dir.path()).unwrap())
        .unwrap();

    assert_eq!(first.stats.re_extracted, 6);
    assert_eq!(second.stats.cache_hits, 6);
    assert_eq!(second.stats.re_extracted, 0);
    assert_eq!(
        formatter.format(&first).unwrap(),
        formatter.format(&second).unwrap()
    );
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let dir = tempfile::TempDir::new().unwrap();
    django_project(dir.path());
    let formatter = JsonFormatter::compact();

    let parallel = analyzer().analyze(dir.path(), &MemoryCache::new()).unwrap();
    let sequential = CodeAnalyzer::new(&AnalyzerConfig::default().with_parallel(false))
        .unwrap()
        .analyze(dir.path(), &MemoryCache::new())
        .unwrap();

    assert_eq!(
        formatter.format(&parallel).unwrap(),
        formatter.format(&sequential).unwrap()
    );
}

#[test]
fn unreadable_root_is_the_only_fatal_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing");
    assert!(matches!(
        analyzer().analyze(&missing, &MemoryCache::new()),
        Err(AnalysisError::UnreadableRoot { .. })
    ));

    let file = dir.path().join("settings.py");
    fs::write(&file, "DEBUG = True\n").unwrap();
    assert!(matches!(
        analyzer().analyze(&file, &MemoryCache::new()),
        Err(AnalysisError::UnreadableRoot { .. })
    ));

    let empty = analyzer().analyze(dir.path(), &MemoryCache::new()).unwrap();
    assert!(empty.graph.entities.is_empty());
    assert_eq!(empty.graph.totals.files, 1);
}
