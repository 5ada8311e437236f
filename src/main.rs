//! idlib command-line interface: `index`, `identify`, `candidates`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use idlib::{
    identify_directory, prune, score_repository, Catalog, GitRepo, IdlibResult, IndexMode,
    IndexStore, Indexer,
};

#[derive(Parser)]
#[command(
    name = "idlib",
    version,
    about = "Identify embedded open-source libraries by content fingerprinting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level progress output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the fingerprint index from the library catalog
    Index(IndexArgs),
    /// Identify embedded libraries in a source directory
    Identify(IdentifyArgs),
    /// Rank a repository's paths as fingerprint-file candidates
    Candidates(CandidatesArgs),
}

#[derive(Parser)]
struct IndexArgs {
    /// Database path
    #[arg(short = 'd', long = "db", default_value = "idlib.sqlite")]
    db: PathBuf,

    /// Library catalog path
    #[arg(short, long, default_value = "idlib.toml")]
    catalog: PathBuf,

    /// Index only a specific library
    #[arg(short, long)]
    library: Option<String>,

    /// Index mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Sparse)]
    mode: ModeArg,

    /// Only prune the database, index nothing
    #[arg(long, conflicts_with = "no_prune")]
    prune_only: bool,

    /// Index without pruning afterwards
    #[arg(long)]
    no_prune: bool,

    /// Hashing worker threads (default: one per core)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Sparse,
    Full,
}

impl std::fmt::Display for ModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sparse => write!(f, "sparse"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl From<ModeArg> for IndexMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sparse => IndexMode::Sparse,
            ModeArg::Full => IndexMode::Full,
        }
    }
}

#[derive(Parser)]
struct IdentifyArgs {
    /// Directory containing the source code to search
    directory: PathBuf,

    /// Database path
    #[arg(short = 'd', long = "db", default_value = "idlib.sqlite")]
    db: PathBuf,

    /// Report only detected libraries and their most probable version
    #[arg(short, long)]
    summarize: bool,

    /// Machine-readable JSON output
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CandidatesArgs {
    /// Path to a git repository
    repo_path: PathBuf,

    /// Limit the number of results
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Index(args) => run_index(args),
        Commands::Identify(args) => run_identify(args),
        Commands::Candidates(args) => run_candidates(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_index(args: IndexArgs) -> IdlibResult<()> {
    let catalog = Catalog::load(&args.catalog)?;
    let libraries = catalog.select(args.library.as_deref())?;

    // Every library is validated before any store mutation; a bad entry
    // aborts the whole run with nothing written.
    catalog.validate(&libraries)?;

    if let Some(workers) = args.workers {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
        {
            tracing::warn!("cannot size worker pool: {e}");
        }
    }

    let mut store = IndexStore::open(&args.db)?;

    if !args.prune_only {
        let mut indexer = Indexer::new(&mut store, &catalog);
        let stats = indexer.run(&libraries, args.mode.into())?;
        for s in &stats {
            println!(
                "{:<15} {:>8} commits {:>8} records  ({} mode, {}ms)",
                s.library, s.commits_seen, s.records_written, s.mode, s.duration_ms
            );
        }
    }

    if !args.no_prune {
        let report = prune(&mut store, &catalog)?;
        store.vacuum()?;
        println!(
            "pruned {} records ({} empty, {} embedded, {} ambiguous; {} audit entries)",
            report.total_removed(),
            report.empty_removed,
            report.embedded_removed,
            report.ambiguous_removed,
            report.audit.len()
        );
    }

    Ok(())
}

fn run_identify(args: IdentifyArgs) -> IdlibResult<()> {
    let store = IndexStore::open_read_only(&args.db)?;
    let report = identify_directory(&store, &args.directory)?;

    // Zero matches is an answer, not an error: exit 0 either way.
    if args.json {
        let text = if args.summarize {
            let summary: std::collections::BTreeMap<_, _> =
                report.summarized().into_iter().collect();
            serde_json::to_string_pretty(&summary)?
        } else {
            serde_json::to_string_pretty(&report)?
        };
        println!("{text}");
        return Ok(());
    }

    if args.summarize {
        for (library, record) in report.summarized() {
            println!("{library} {}", record.version_descriptor);
        }
    } else {
        for (library, finding) in report.detailed() {
            println!(
                "{:<10}  {:<30}  {}",
                library,
                finding.record.version_descriptor,
                finding.rel_path.display()
            );
        }
    }
    Ok(())
}

fn run_candidates(args: CandidatesArgs) -> IdlibResult<()> {
    let repo = GitRepo::open(&args.repo_path)?;
    println!("This may take a long time, depending on the repo size...");
    let candidates = score_repository(&repo, args.limit)?;

    println!("Score  TimeCov  CommitCov  Path");
    for c in &candidates {
        println!(
            "{:.3}  {:.3}    {:.3}      {}",
            c.score, c.time_coverage, c.commit_coverage, c.path
        );
    }

    println!();
    println!("Suggested catalog entry:");
    println!("files = [");
    for c in &candidates {
        println!("    {:?},", c.path);
    }
    println!("]");
    Ok(())
}
