use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use django_context::config::{AnalyzerConfig, ScanMode};
use django_context::core::CodeAnalyzer;
use django_context::formatters::JsonFormatter;
use django_context::parsers::cache::{DiskCache, EntityCache, MemoryCache};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "django-context",
    version,
    about = "Extracts a structured context graph from a Django codebase"
)]
struct Cli {
    /// Project root to analyze
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Output file path
    #[arg(short, long, value_name = "FILE", default_value = "django-context.json")]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the persistent entity cache (overrides the config file)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Ignore cached entries and extract every file again
    #[arg(long)]
    full_rescan: bool,

    /// Keep the cache in memory for this run only
    #[arg(long, conflicts_with = "cache_dir")]
    no_cache: bool,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "django_context=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();

    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    if cli.full_rescan {
        config = config.with_mode(ScanMode::FullRescan);
    }
    if cli.cache_dir.is_some() {
        config.cache_dir = cli.cache_dir.clone();
    }
    if cli.no_cache {
        config.cache_dir = None;
    }

    let cache: Box<dyn EntityCache> = match &config.cache_dir {
        Some(dir) => Box::new(
            DiskCache::new(dir)
                .with_context(|| format!("failed to open cache at {}", dir.display()))?,
        ),
        None => Box::new(MemoryCache::new()),
    };

    let analyzer = CodeAnalyzer::new(&config)?;
    let output = analyzer
        .analyze(&cli.input, cache.as_ref())
        .with_context(|| format!("failed to analyze {}", cli.input.display()))?;

    let formatter = if cli.compact {
        JsonFormatter::compact()
    } else {
        JsonFormatter::new()
    };
    formatter.format_to_file(&output, &cli.output)?;

    println!(
        "{} entities, {} links ({} unresolved), {} diagnostics",
        output.graph.totals.entities,
        output.graph.totals.links,
        output.graph.totals.unresolved,
        output.diagnostics.len()
    );
    println!(
        "Files: {} ({} cached, {} extracted, {} unreadable, {} evicted)",
        output.stats.files,
        output.stats.cache_hits,
        output.stats.re_extracted,
        output.stats.unreadable,
        output.stats.evicted
    );
    println!(
        "Wrote {} in {:.2}s",
        cli.output.display(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
