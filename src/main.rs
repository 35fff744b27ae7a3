//! ttlload - Bulk Loader and TTL Lifecycle Monitor
//!
//! This is the main entry point. It provisions the in-memory `cardHistory`
//! collection, starts its TTL sweeper, and then either runs a full bulk load
//! or a small smoke load, followed by lifecycle inspection.

use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ttlload::config::{
    LoadConfig, MonitorConfig, DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_EVERY, DEFAULT_TOTAL_RECORDS,
};
use ttlload::loader::{smoke_load, BulkLoader};
use ttlload::monitor::LifecycleMonitor;
use ttlload::store::{card_history_collection, MemoryCollection, Store, SweeperConfig, TtlSweeper};

/// Bulk-load synthetic card history and watch the TTL index expire it.
#[derive(Parser, Debug)]
#[command(name = "ttlload", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and insert records in batches, then inspect their expiration
    Load(LoadArgs),

    /// Replace the collection with 1000 fixed test documents and inspect once
    Smoke(SmokeArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Number of records to insert
    #[arg(long, env = "TTLLOAD_TOTAL_RECORDS", default_value_t = DEFAULT_TOTAL_RECORDS)]
    total_records: u64,

    /// Records per insert_many call
    #[arg(long, env = "TTLLOAD_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    /// Seconds from run start until every record expires
    #[arg(long, env = "TTLLOAD_TTL_SECS", default_value_t = 300)]
    ttl_secs: u64,

    /// Report progress every N batches
    #[arg(long, env = "TTLLOAD_PROGRESS_EVERY", default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: u64,

    /// Seed for reproducible record values
    #[arg(long, env = "TTLLOAD_SEED")]
    seed: Option<u64>,

    #[command(flatten)]
    sweep: SweepArgs,

    #[command(flatten)]
    watch: WatchArgs,
}

#[derive(Args, Debug)]
struct SmokeArgs {
    /// Seconds from now until the test documents expire
    #[arg(long, env = "TTLLOAD_TTL_SECS", default_value_t = 300)]
    ttl_secs: u64,

    #[command(flatten)]
    sweep: SweepArgs,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Seconds between TTL sweeps of the collection
    #[arg(long, env = "TTLLOAD_SWEEP_SECS", default_value_t = 60)]
    sweep_secs: u64,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Re-inspect every N seconds until the collection is empty (0 = inspect once)
    #[arg(long, env = "TTLLOAD_WATCH_SECS", default_value_t = 0)]
    watch_secs: u64,

    /// Stop watching after this many inspections
    #[arg(long, env = "TTLLOAD_MAX_ROUNDS")]
    max_rounds: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("ttlload v{}", ttlload::VERSION);

    match cli.command {
        Command::Load(args) => run_load(args).await,
        Command::Smoke(args) => run_smoke(args).await,
    }
}

/// Provisions the collection and starts its sweeper.
fn provision(sweep: &SweepArgs) -> anyhow::Result<(Arc<MemoryCollection>, TtlSweeper, MonitorConfig)> {
    let interval = Duration::from_secs(sweep.sweep_secs.max(1));
    let collection = Arc::new(card_history_collection()?);
    let sweeper = TtlSweeper::start(Arc::clone(&collection), SweeperConfig { interval });

    let monitor_config = MonitorConfig {
        sweep_interval: interval,
        ..Default::default()
    };
    Ok((collection, sweeper, monitor_config))
}

async fn run_load(args: LoadArgs) -> anyhow::Result<()> {
    let (collection, _sweeper, monitor_config) = provision(&args.sweep)?;
    let store: Arc<dyn Store> = collection;

    let mut config = LoadConfig::new(args.total_records, args.batch_size)?
        .with_ttl_offset(Duration::from_secs(args.ttl_secs))
        .with_progress_every(args.progress_every);
    config.seed = args.seed;

    let loader = BulkLoader::new(Arc::clone(&store), config)?;
    let config = loader.config();
    println!(
        "Configuration: {} documents in {} batches of {}",
        config.total_records,
        config.total_records.div_ceil(config.batch_size),
        config.batch_size
    );

    let summary = loader
        .run_with_progress(|progress| println!("{}", progress))
        .await;
    println!("\n{}", summary);

    let final_count = store.count_documents().await?;
    println!("Final verification count: {} documents", final_count);

    println!("\nSample documents:");
    for document in store.find(3).await? {
        println!(
            "- Document ID: {}, Card: {}, Action: {}",
            document["_id"],
            document["cardId"].as_str().unwrap_or("-"),
            document["action"].as_str().unwrap_or("-")
        );
    }

    let monitor = LifecycleMonitor::new(store, monitor_config);
    watch_lifecycle(&monitor, &args.watch).await;

    if let Some(failure) = summary.failure {
        return Err(failure.into());
    }
    Ok(())
}

async fn run_smoke(args: SmokeArgs) -> anyhow::Result<()> {
    let (collection, _sweeper, monitor_config) = provision(&args.sweep)?;
    let store: Arc<dyn Store> = collection;

    let ttl = chrono::Duration::from_std(Duration::from_secs(args.ttl_secs))?;
    let report = smoke_load(store.as_ref(), ttl).await?;

    println!("Remove at time: {}", report.remove_at.to_rfc3339());
    println!("Cleared {} existing documents", report.cleared);
    println!("Inserted {} test documents", report.inserted);
    println!("Total count: {}", report.total_count);
    if let Some(sample) = &report.sample {
        println!("Sample document:\n{}", serde_json::to_string_pretty(sample)?);
    }

    let monitor = LifecycleMonitor::new(store, monitor_config);
    println!("\n{}", monitor.inspect().await);
    Ok(())
}

/// Inspects once, or keeps inspecting until the collection drains or Ctrl+C.
async fn watch_lifecycle(monitor: &LifecycleMonitor, args: &WatchArgs) {
    if args.watch_secs == 0 {
        println!("\n{}", monitor.inspect().await);
        return;
    }

    let every = Duration::from_secs(args.watch_secs);
    let watch = monitor.watch(every, args.max_rounds, |report| println!("\n{}", report));

    tokio::select! {
        rounds = watch => info!(rounds = rounds, "Lifecycle watch finished"),
        _ = signal::ctrl_c() => info!("Interrupted, stopping lifecycle watch"),
    }
}
