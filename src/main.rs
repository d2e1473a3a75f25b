use anyhow::{Context, Result};
use citesieve::cache::{self, MemoryCache};
use citesieve::resolve::Resolver;
use citesieve::schemes::Registry;
use citesieve::stats::ProcessStats;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "citesieve")]
#[command(about = "Filter bibliographic metadata dumps into citation-only chunked extracts")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one provider dump into chunked citation extracts
    Process(ProcessArgs),
    /// Build a validation-cache snapshot from a list of identifiers
    BuildCache(BuildCacheArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    Crossref,
    Datacite,
    Jalc,
    Openaire,
    Icite,
}

#[derive(Args)]
struct ProcessArgs {
    /// Source provider whose dump format to expect
    #[arg(short, long)]
    source: Source,

    /// Input dump: a file or a directory of files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for chunk files
    #[arg(short, long)]
    output: PathBuf,

    /// Number of records per output chunk
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Validation-cache snapshot of identifiers known to be valid
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Use an empty throwaway cache regardless of --cache
    #[arg(long)]
    test_mode: bool,
}

#[derive(Args)]
struct BuildCacheArgs {
    /// Newline-delimited list of normalized identifiers
    #[arg(short, long)]
    input: PathBuf,

    /// Path of the snapshot file to write
    #[arg(short, long)]
    output: PathBuf,
}

fn run_process(args: ProcessArgs) -> Result<()> {
    let cache = if args.test_mode {
        info!("Test mode: using an empty in-memory cache");
        MemoryCache::new()
    } else if let Some(ref path) = args.cache {
        cache::load_snapshot(path)?
    } else {
        MemoryCache::new()
    };

    let registry = Registry::new();
    let resolver = Resolver::new(&registry, &cache);

    info!(source = ?args.source, input = ?args.input, "Starting processing pass");
    let start = Instant::now();
    let stats = match args.source {
        Source::Crossref => {
            citesieve::crossref::process(&args.input, &args.output, args.interval, &resolver)
        }
        Source::Datacite => {
            citesieve::datacite::process(&args.input, &args.output, args.interval, &resolver)
        }
        Source::Jalc => {
            citesieve::jalc::process(&args.input, &args.output, args.interval, &resolver)
        }
        Source::Openaire => {
            citesieve::openaire::process(&args.input, &args.output, args.interval, &resolver)
        }
        Source::Icite => {
            citesieve::icite::process(&args.input, &args.output, args.interval, &resolver)
        }
    }?;
    let duration = start.elapsed();
    info!(
        duration_secs = duration.as_secs_f64(),
        "Processing complete"
    );

    print_summary(&stats, duration.as_secs_f64());
    Ok(())
}

fn print_summary(stats: &ProcessStats, duration_secs: f64) {
    println!();
    println!("=== Summary ===");
    println!("Processing time:    {:.2}s", duration_secs);
    println!();
    println!("Records seen:       {}", stats.records_seen);
    println!("Records kept:       {}", stats.records_kept);
    println!("Records skipped:    {}", stats.records_skipped);
    println!("Malformed lines:    {}", stats.malformed_lines);
    println!("Ids resolved:       {}", stats.ids_resolved);
    println!("Ids rejected:       {}", stats.ids_rejected);
    println!("Chunks written:     {}", stats.chunks_written);
}

fn run_build_cache(args: BuildCacheArgs) -> Result<()> {
    let count = cache::build_snapshot(&args.input, &args.output)
        .with_context(|| format!("Failed to build cache snapshot from: {:?}", args.input))?;
    println!("Cache snapshot written: {} identifiers", count);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Process(args) => run_process(args),
        Commands::BuildCache(args) => run_build_cache(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
