use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use csearch::error::Error;
use csearch::grep::Grep;
use csearch::index::store::{self, IndexStore};
use csearch::index::{IndexReader, IndexWriter};
use csearch::output::{OutputOptions, Printer};
use csearch::query::{parse_pattern, regexp_query};
use csearch::utils::CancelToken;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "csearch")]
#[command(about = "Trigram-indexed regex search over source code")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or update the trigram index
    ///
    /// Adds the named files or directory trees to the index stored in
    /// $CSEARCHINDEX (default: ~/.csearchindex). With no paths, re-indexes
    /// the previously added roots.
    Index {
        /// List indexed paths and exit
        #[arg(long)]
        list: bool,

        /// Discard the existing index first; with no paths, delete the index
        #[arg(long)]
        reset: bool,

        /// Print extra information
        #[arg(long)]
        verbose: bool,

        /// Files or directory trees to index
        paths: Vec<PathBuf>,
    },

    /// Search indexed files like grep
    ///
    /// Exits 0 if anything matched, 1 if nothing did, 2 on error.
    #[command(disable_help_flag = true)]
    Search {
        /// Print match counts only
        #[arg(short = 'c')]
        counts: bool,

        /// Search only files with names matching this regex
        #[arg(short = 'f', value_name = "FILE_REGEX")]
        file_regex: Option<String>,

        /// Omit file names
        #[arg(short = 'h')]
        no_filename: bool,

        /// Case-insensitive search
        #[arg(short = 'i')]
        ignore_case: bool,

        /// List matching file names only
        #[arg(short = 'l')]
        files_with_matches: bool,

        /// Show line numbers
        #[arg(short = 'n')]
        line_numbers: bool,

        /// Print extra information
        #[arg(long)]
        verbose: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        #[arg(long, action = ArgAction::HelpLong)]
        help: Option<bool>,

        /// RE2-style regular expression to search for
        pattern: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("csearch: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Index {
            list,
            reset,
            verbose,
            paths,
        } => {
            init_tracing(verbose);
            run_index(list, reset, paths)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search {
            counts,
            file_regex,
            no_filename,
            ignore_case,
            files_with_matches,
            line_numbers,
            verbose,
            no_color,
            help: _,
            pattern,
        } => {
            init_tracing(verbose);
            let opts = OutputOptions {
                with_filename: !no_filename,
                line_numbers,
                color: !no_color,
            };
            run_search(
                &pattern,
                file_regex.as_deref(),
                ignore_case,
                files_with_matches,
                counts,
                opts,
            )
        }
    }
}

fn run_index(list: bool, reset: bool, paths: Vec<PathBuf>) -> Result<()> {
    let dir = store::index_dir();

    if list {
        let reader = IndexReader::open(&dir)?;
        for path in reader.paths()? {
            println!("{path}");
        }
        return Ok(());
    }

    if reset {
        IndexStore::destroy(&dir)?;
        if paths.is_empty() {
            return Ok(());
        }
    }

    // Absolute paths, sorted, so the walk order is stable.
    let mut roots = Vec::new();
    for path in &paths {
        match path.canonicalize() {
            Ok(abs) => roots.push(abs),
            Err(e) => tracing::warn!("{}: {e}", path.display()),
        }
    }
    roots.sort();
    roots.dedup();

    if roots.is_empty() {
        // Re-index whatever was added before.
        roots = match IndexReader::open(&dir) {
            Ok(reader) => reader.paths()?.into_iter().map(PathBuf::from).collect(),
            Err(Error::IndexMissing(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
    }

    let mut writer = IndexWriter::create(&dir)?;
    writer.index_paths(&roots, &CancelToken::new())?;
    Ok(())
}

fn run_search(
    pattern: &str,
    file_regex: Option<&str>,
    ignore_case: bool,
    files_with_matches: bool,
    counts: bool,
    opts: OutputOptions,
) -> Result<ExitCode> {
    // Compile before touching the index: a bad pattern never opens the store.
    let hir = parse_pattern(pattern, ignore_case)?;
    let query = regexp_query(&hir);
    let grep = Grep::new(pattern, ignore_case)?;
    let file_re = match file_regex {
        Some(f) => Some(regex::Regex::new(f).map_err(Error::from)?),
        None => None,
    };

    let reader = IndexReader::open(&store::index_dir())?;
    debug!("query: {query}");
    let candidates = reader.posting_query(&query)?;
    debug!("{} candidate files", candidates.len());

    let mut printer = Printer::new(opts);
    let mut matched = false;

    for file_id in candidates {
        let Some(name) = reader.name(file_id)? else {
            continue;
        };
        if let Some(re) = &file_re {
            if !re.is_match(&name) {
                continue;
            }
        }
        let Some(content) = reader.contents(file_id)? else {
            continue;
        };
        let fm = grep.scan(&name, &content);
        if fm.count == 0 {
            continue;
        }
        matched = true;
        if files_with_matches {
            printer.file_name(&fm)?;
        } else if counts {
            printer.count(&fm)?;
        } else {
            printer.matches(&fm)?;
        }
    }

    Ok(if matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
