//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep catalog crawler.

use anyhow::{bail, Context};
use catalog_sweep::config::{load_config_with_hash, validate, Config, ListingLayout};
use catalog_sweep::crawler::Coordinator;
use catalog_sweep::output::{
    build_exporter, generate_markdown_summary, print_statistics, RunSummary,
};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Sweep: a bounded-concurrency catalog crawler
///
/// Catalog-Sweep walks every section of a product catalog, paginates each
/// listing until it runs dry, and extracts one structured record per product
/// page. Records are exported as JSON, CSV or into SQLite.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version)]
#[command(about = "A bounded-concurrency catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Write records here instead of the configured output path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Override the configured fetch concurrency
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides and re-validates
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(path) = &cli.output {
        config.output.path = path.display().to_string();
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.fetch_concurrency = concurrency;
    }
    validate(config).context("Invalid command-line override")?;
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Site:");
    println!("  Catalog: {}", config.catalog_url()?);
    println!("  Section selector: {}", config.site.section_selector);
    println!("  Page parameter: {}", config.site.page_param);

    println!("\nCrawler Configuration:");
    println!("  Page size baseline: {}", config.crawler.page_size_baseline);
    println!(
        "  Max pages per section: {}",
        config.crawler.max_pages_per_section
    );
    println!("  Fetch concurrency: {}", config.crawler.fetch_concurrency);
    println!(
        "  Section concurrency: {}",
        config.crawler.section_concurrency
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    match config.crawler.run_timeout() {
        Some(timeout) => println!("  Run timeout: {}s", timeout.as_secs()),
        None => println!("  Run timeout: none"),
    }
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nListing:");
    println!(
        "  Default: {} ({})",
        layout_name(config.listing.layout),
        config.listing.item_selector
    );
    for entry in &config.listing.overrides {
        println!(
            "  - {}: {} ({})",
            entry.path_prefix,
            layout_name(entry.layout),
            entry
                .item_selector
                .as_deref()
                .unwrap_or(&config.listing.item_selector)
        );
    }

    println!("\nFields ({}):", config.fields.len());
    for rule in &config.fields {
        println!(
            "  - {}{}: {}",
            rule.name,
            if rule.required { " (required)" } else { "" },
            rule.selector
        );
    }

    println!("\nOutput:");
    println!("  Records: {} ({:?})", config.output.path, config.output.format);
    if let Some(summary_path) = &config.output.summary_path {
        println!("  Summary: {}", summary_path);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

fn layout_name(layout: ListingLayout) -> &'static str {
    match layout {
        ListingLayout::DetailLinks => "detail-links",
        ListingLayout::InlineRecords => "inline-records",
    }
}

/// Handles the main crawl operation
///
/// Records and summaries are written even when the run aborts; the fatal error
/// is returned afterwards so the exit status reflects it.
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let catalog_url = config.catalog_url()?.to_string();
    let coordinator =
        Coordinator::new(config.clone()).context("Failed to initialize crawler")?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    tracing::info!(
        "Starting crawl of {} (fetch concurrency {})",
        catalog_url,
        config.crawler.fetch_concurrency
    );
    let started_at = Utc::now();
    let report = coordinator.run().await;

    let exporter = build_exporter(&config.output, &config.fields);
    let exported = exporter.export(&report.records);
    match &exported {
        Ok(count) => tracing::info!("Exported {} records to {}", count, exporter.destination()),
        Err(e) => tracing::error!("Export to {} failed: {}", exporter.destination(), e),
    }

    let mut summary = RunSummary::from_report(&report, started_at, config_hash, catalog_url);
    summary.records_exported = *exported.as_ref().unwrap_or(&0);

    if let Err(e) = exporter.record_run(&summary) {
        tracing::warn!("Failed to record run: {}", e);
    }

    if let Some(summary_path) = &config.output.summary_path {
        match generate_markdown_summary(&summary, Path::new(summary_path)) {
            Ok(()) => tracing::info!("Summary written to {}", summary_path),
            Err(e) => tracing::warn!("Failed to write summary: {}", e),
        }
    }

    print_statistics(&summary);

    exported.context("Failed to export records")?;

    if let Err(e) = report.outcome {
        tracing::error!("Crawl failed: {}", e);
        bail!(e);
    }

    tracing::info!("Crawl completed successfully");
    Ok(())
}
