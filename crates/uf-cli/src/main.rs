//! Unfeed CLI
//!
//! CLI tool for checking keywords, sweeping saved pages and managing the
//! selector configuration.

mod simulate;

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use uf_config::{
    now_millis, ConfigProvider, FetchPolicy, FileStorage, HttpSource, MemoryStorage, ProviderConfig,
};
use uf_core::{ActionMode, Document, FilterConfig, FilterEngine, KeywordMatcher, MemoryDocument, RemovalCounter};

const DEFAULT_STORAGE: &str = "unfeed-storage.json";

#[derive(Parser)]
#[command(name = "uf-cli")]
#[command(about = "Unfeed keyword filter tools")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether text mentions any keyword
    Check {
        /// Text to check
        #[arg(short, long)]
        text: String,

        /// Keyword to look for (repeatable)
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,
    },

    /// Filter a saved HTML page
    Sweep {
        /// Input HTML file
        #[arg(short, long)]
        input: String,

        /// Use the configured selectors for this hostname
        #[arg(long, conflicts_with = "selectors", required_unless_present = "selectors")]
        host: Option<String>,

        /// Unit selector (repeatable)
        #[arg(short, long = "selector")]
        selectors: Vec<String>,

        /// Keyword (repeatable). Defaults to the stored keyword list.
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        /// Flag matches instead of removing them
        #[arg(long)]
        mark: bool,

        /// Storage file holding saved keywords and settings
        #[arg(long)]
        storage: Option<String>,

        /// Write the filtered page here
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Resolve and show the configuration
    Config {
        /// Storage file (created if missing)
        #[arg(long, default_value = DEFAULT_STORAGE)]
        storage: String,

        /// Refetch the selector map even if the cache is fresh
        #[arg(long, conflicts_with = "local")]
        refresh: bool,

        /// Built-in selector map only, no network
        #[arg(long)]
        local: bool,

        /// Only show the configuration for this hostname
        #[arg(long)]
        host: Option<String>,
    },

    /// Time the engine against a growing in-memory feed
    Simulate {
        /// Number of mutation batches
        #[arg(short, long, default_value_t = 500)]
        batches: usize,

        /// Feed items appended per batch
        #[arg(long, default_value_t = 20)]
        batch_size: usize,

        /// Every Nth item mentions a keyword
        #[arg(long, default_value_t = 7)]
        match_every: usize,

        /// Seed for title selection
        #[arg(long)]
        seed: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check { text, keywords } => cmd_check(&text, &keywords),
        Commands::Sweep {
            input,
            host,
            selectors,
            keywords,
            mark,
            storage,
            output,
        } => cmd_sweep(SweepArgs {
            input,
            host,
            selectors,
            keywords,
            mark,
            storage,
            output,
        }),
        Commands::Config {
            storage,
            refresh,
            local,
            host,
        } => cmd_config(&storage, refresh, local, host.as_deref()),
        Commands::Simulate {
            batches,
            batch_size,
            match_every,
            seed,
        } => cmd_simulate(simulate::SimulateOptions {
            batches,
            batch_size,
            match_every,
            seed,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn cmd_check(text: &str, keywords: &[String]) -> Result<(), String> {
    let matcher = KeywordMatcher::new(keywords).map_err(|e| format!("Invalid keyword: {}", e))?;
    match matcher.find_keyword(text) {
        Some(keyword) => println!("match: '{}'", keyword),
        None => println!("no match"),
    }
    Ok(())
}

struct SweepArgs {
    input: String,
    host: Option<String>,
    selectors: Vec<String>,
    keywords: Vec<String>,
    mark: bool,
    storage: Option<String>,
    output: Option<String>,
}

fn local_config(storage: Option<&str>) -> Result<ProviderConfig, String> {
    match storage {
        Some(path) => {
            let storage = FileStorage::open(path).map_err(|e| format!("Failed to open storage: {}", e))?;
            Ok(ConfigProvider::new(storage).resolve_local())
        }
        None => Ok(ConfigProvider::new(MemoryStorage::new()).resolve_local()),
    }
}

fn cmd_sweep(args: SweepArgs) -> Result<(), String> {
    let html = fs::read_to_string(&args.input).map_err(|e| format!("Failed to read '{}': {}", args.input, e))?;
    let provider_config = local_config(args.storage.as_deref())?;

    let mut config = match &args.host {
        Some(host) => provider_config.for_host(host),
        None => FilterConfig::new(
            args.selectors.clone(),
            provider_config.filters.clone(),
            provider_config.action_mode(),
        ),
    };
    if !args.keywords.is_empty() {
        config.filters = args.keywords.clone();
    }
    if args.mark {
        config.action_mode = ActionMode::Mark;
    }

    let start = Instant::now();
    let mut doc = MemoryDocument::from_html(&html);
    let parse_time = start.elapsed();

    let mut engine: FilterEngine<MemoryDocument, RemovalCounter> =
        FilterEngine::new(config, RemovalCounter::new()).map_err(|e| format!("Invalid keyword: {}", e))?;
    if engine.is_inert() {
        println!("Nothing to filter: no selectors for this page");
    }

    let sweep_start = Instant::now();
    let report = engine.sweep(&mut doc);
    let sweep_time = sweep_start.elapsed();

    println!("Swept '{}' ({})", args.input, engine.action_mode().as_str());
    println!("  Selectors:  {}", engine.selectors().join(", "));
    println!("  Keywords:   {}", engine.matcher().len());
    println!("  Candidates: {}", report.candidates);
    println!("  Matched:    {}", report.matched);
    println!("  Removed:    {}", report.removed);
    println!("  Marked:     {}", report.marked);
    println!(
        "  Time:       {:.1}ms (parse: {:.1}ms, sweep: {:.1}ms)",
        start.elapsed().as_secs_f64() * 1000.0,
        parse_time.as_secs_f64() * 1000.0,
        sweep_time.as_secs_f64() * 1000.0,
    );

    if let Some(output) = &args.output {
        let root = doc.document_root();
        let html = format!("<!DOCTYPE html>\n{}\n", doc.to_html(root));
        fs::write(output, html).map_err(|e| format!("Failed to write '{}': {}", output, e))?;
        println!("Wrote '{}'", output);
    }

    Ok(())
}

fn cmd_config(storage_path: &str, refresh: bool, local: bool, host: Option<&str>) -> Result<(), String> {
    let storage = FileStorage::open(storage_path).map_err(|e| format!("Failed to open storage: {}", e))?;
    let mut provider = ConfigProvider::new(storage);

    let policy = if local {
        FetchPolicy::LocalOnly
    } else if refresh {
        FetchPolicy::ForceRemote
    } else {
        FetchPolicy::CachedOrRemote
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let source = HttpSource::default();
    let resolution = runtime.block_on(provider.resolve(&source, policy, now_millis()));

    if let Some(error) = &resolution.error {
        eprintln!("Warning: {} (using {} selectors)", error, resolution.source.as_str());
    }

    let config = &resolution.config;
    println!("Storage:  {}", provider.storage().path().display());
    println!("Source:   {}", resolution.source.as_str());
    println!("Mode:     {}", config.action_mode().as_str());
    println!("Keywords: {}", serde_json::to_string(&config.filters).map_err(|e| e.to_string())?);

    match host {
        Some(host) => match config.selectors_for(host) {
            Some(selectors) => println!("{}: {}", host, selectors.join(", ")),
            None => println!("{}: unsupported", host),
        },
        None => {
            println!("Sites:    {}", config.websites.len());
            for (site, selectors) in &config.websites {
                println!("  {}: {}", site, selectors.join(", "));
            }
        }
    }

    Ok(())
}

fn cmd_simulate(opts: simulate::SimulateOptions) -> Result<(), String> {
    println!("============================================================");
    println!("Unfeed Infinite-Scroll Simulation");
    println!("============================================================");
    println!(
        "Batches: {}, batch size: {}, match every: {}",
        opts.batches, opts.batch_size, opts.match_every
    );

    let result = simulate::run(&opts)?;
    println!("{}", simulate::format_result(&result));
    Ok(())
}
