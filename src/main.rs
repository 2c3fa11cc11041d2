//! Priority-Crawl main entry point
//!
//! This is the command-line interface for the Priority-Crawl relevance-guided crawler.

use anyhow::Context;
use clap::Parser;
use priority_crawl::config::{load_config_with_hash, validate, Config};
use priority_crawl::output::{write_report, FanoutSink, JsonLinesSink, MemorySink, SqliteSink};
use priority_crawl::{Coordinator, CrawlSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Priority-Crawl: a relevance-guided web crawler
///
/// Priority-Crawl starts from a seed URL and follows only the links an
/// external scoring oracle rates as relevant to the given context, down to a
/// maximum depth.
#[derive(Parser, Debug)]
#[command(name = "priority-crawl")]
#[command(version)]
#[command(about = "A relevance-guided web crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "SEED")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Maximum link depth from the seed (overrides the config)
    #[arg(short, long)]
    depth: Option<u32>,

    /// Description of the content of interest, passed to the oracle
    #[arg(long, default_value = "")]
    context: String,

    /// Append records to this JSON Lines file
    #[arg(long, value_name = "PATH")]
    jsonl: Option<PathBuf>,

    /// Store records in this SQLite database
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Write a markdown report to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Output destinations after merging CLI flags over the config
struct OutputPaths {
    jsonl: Option<PathBuf>,
    db: Option<PathBuf>,
    report: Option<PathBuf>,
}

impl OutputPaths {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        let from_config = |path: &Option<String>| path.as_ref().map(PathBuf::from);
        Self {
            jsonl: cli.jsonl.clone().or_else(|| from_config(&config.output.jsonl_path)),
            db: cli.db.clone().or_else(|| from_config(&config.output.database_path)),
            report: cli
                .report
                .clone()
                .or_else(|| from_config(&config.output.report_path)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), String::from("default"))
        }
    };
    validate(&config)?;

    let depth = cli.depth.unwrap_or(config.crawler.max_depth);
    let outputs = OutputPaths::resolve(&cli, &config);

    if cli.dry_run {
        handle_dry_run(&cli, &config, depth, &outputs);
        return Ok(());
    }

    let summary = handle_crawl(&cli, &config, &config_hash, depth, &outputs).await?;
    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` wins over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "priority_crawl=info,warn",
            1 => "priority_crawl=debug,info",
            2 => "priority_crawl=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(cli: &Cli, config: &Config, depth: u32, outputs: &OutputPaths) {
    println!("=== Priority-Crawl Dry Run ===\n");

    println!("Seed: {}", cli.seed);
    println!("Max depth: {}", depth);
    if !cli.context.is_empty() {
        println!("Context: {}", cli.context);
    }

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", config.crawler.max_workers);
    println!("  Traversal: {:?}", config.crawler.traversal);
    println!(
        "  Request delay: {}s",
        config.crawler.request_delay_seconds
    );
    println!(
        "  Priority threshold: {}",
        config.crawler.priority_threshold
    );
    println!(
        "  Links per score batch: {}",
        config.crawler.max_links_per_score_batch
    );
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOracle:");
    match &config.oracle {
        Some(oracle) => {
            println!("  Endpoint: {}", oracle.endpoint);
            println!("  Model: {}", oracle.model);
            println!("  API key variable: {}", oracle.api_key_env);
            println!("  Score links: {}", oracle.score_links);
            println!("  Analyze content: {}", oracle.analyze_content);
        }
        None => println!("  (none, every link up to the batch size is followed)"),
    }

    println!("\nOutput:");
    print_path("JSON Lines", outputs.jsonl.as_deref());
    print_path("Database", outputs.db.as_deref());
    print_path("Report", outputs.report.as_deref());

    println!("\n✓ Configuration is valid");
}

fn print_path(label: &str, path: Option<&Path>) {
    match path {
        Some(path) => println!("  {}: {}", label, path.display()),
        None => println!("  {}: (disabled)", label),
    }
}

/// Record sinks the run writes to, plus handles needed after it ends
struct Sinks {
    fanout: FanoutSink,
    memory: Option<Arc<MemorySink>>,
    database: Option<Arc<SqliteSink>>,
}

impl Sinks {
    fn open(outputs: &OutputPaths, config_hash: &str) -> anyhow::Result<Self> {
        let mut fanout = FanoutSink::new();

        // Records are only buffered when a report needs them.
        let memory = outputs.report.as_ref().map(|_| Arc::new(MemorySink::new()));
        if let Some(memory) = &memory {
            fanout.push(Box::new(Arc::clone(memory)));
        }

        if let Some(path) = &outputs.jsonl {
            let jsonl = JsonLinesSink::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            fanout.push(Box::new(jsonl));
        }

        let database = match &outputs.db {
            Some(path) => {
                let db = Arc::new(
                    SqliteSink::open(path, config_hash)
                        .with_context(|| format!("failed to open {}", path.display()))?,
                );
                tracing::info!("Recording run {} in {}", db.run_id(), path.display());
                fanout.push(Box::new(Arc::clone(&db)));
                Some(db)
            }
            None => None,
        };

        Ok(Self {
            fanout,
            memory,
            database,
        })
    }
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    config: &Config,
    config_hash: &str,
    depth: u32,
    outputs: &OutputPaths,
) -> anyhow::Result<CrawlSummary> {
    let coordinator = Coordinator::from_config(config)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            cancel.cancel();
        }
    });

    let Sinks {
        fanout,
        memory,
        database,
    } = Sinks::open(outputs, config_hash)?;

    let summary = coordinator
        .run(&cli.seed, depth, &cli.context, &fanout)
        .await?;

    if let Some(db) = &database {
        db.complete_run(&summary)
            .context("failed to record run completion")?;
    }

    if let (Some(path), Some(memory)) = (&outputs.report, &memory) {
        write_report(&summary, &memory.records(), path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(summary)
}

fn print_summary(summary: &CrawlSummary) {
    println!("\n=== Crawl {} ===", summary.state);
    println!("Pages succeeded: {}", summary.pages_succeeded);
    println!("Pages failed:    {}", summary.pages_failed);
    println!("Links enqueued:  {}", summary.links_enqueued);
    println!("URLs seen:       {}", summary.urls_seen);
    if summary.sink_failures > 0 {
        println!("Sink failures:   {}", summary.sink_failures);
    }
    println!("Elapsed:         {:.1}s", summary.elapsed.as_secs_f64());
}
