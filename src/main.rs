//! # AJFS Command-Line Tool
//!
//! Entry point for the snapshot database tool. A snapshot of a directory
//! hierarchy is captured once with `scan` and consumed entirely offline
//! afterwards: listing, diffing, duplicate detection, searching and export
//! all run against the database file alone.
//!
//! ## Usage
//!
//! ```bash
//! ajfs scan [db.ajfs] <root> [--hash] [--algo sha1|sha256|sha512]
//! ajfs resume [db.ajfs]
//! ajfs update [db.ajfs]
//! ajfs list [db.ajfs] [--minimal] [--type f] [--size +1m]
//! ajfs info [db.ajfs] [--verbose]
//! ajfs tree [db.ajfs] [subpath]
//! ajfs search [db.ajfs] <regex>
//! ajfs diff <lhs> [rhs] [--hash]
//! ajfs tosync <lhs> <rhs> [--hash]
//! ajfs dupes [db.ajfs] [--dirs] [--tree]
//! ajfs export [db.ajfs] <out> --format csv|json|hashdeep
//! ajfs fix [db.ajfs] [--dry-run] [--restore <backup>]
//! ajfs completion <shell>
//! ```
//!
//! The database path defaults to `./db.ajfs` when omitted. Errors print a
//! single `ERROR: <cause>` line to stderr and exit with code 1.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ajfs::commands::diff::{diff, run_tosync, DiffArgs, ToSyncArgs};
use ajfs::commands::dupes::{dupes, DupesArgs};
use ajfs::commands::export::{run as run_export, ExportArgs};
use ajfs::commands::fix::{run as run_fix, FixArgs};
use ajfs::commands::query::{
    info, list, search, tree, InfoArgs, ListArgs, PredicateArgs, SearchArgs, TreeArgs,
};
use ajfs::commands::scan::{resume, scan, update, ResumeArgs, ScanArgs, UpdateArgs};
use ajfs::commands::{resolve_db_path, CommonConfig};
use ajfs::common::{AjfsResult, CancelToken, DEFAULT_DB_NAME};
use ajfs::export::ExportFormat;
use ajfs::hashing::HashAlgorithm;

#[derive(Parser)]
#[command(
    name = "ajfs",
    version,
    about = "Point-in-time file-system snapshot databases"
)]
struct Cli {
    /// Print more detail and enable debug logging.
    #[arg(long, global = true)]
    verbose: bool,
    /// Report progress while scanning and hashing.
    #[arg(long, global = true)]
    progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a snapshot of a directory into a new database.
    Scan {
        /// Database file, or the root directory when given alone.
        first: PathBuf,
        /// Root directory to scan.
        second: Option<PathBuf>,
        /// Also build a content-hash table.
        #[arg(long)]
        hash: bool,
        /// Content hash algorithm.
        #[arg(long, default_value = "sha1")]
        algo: String,
        /// Replace an existing database file.
        #[arg(long)]
        force: bool,
        /// Regex a path must match to be recorded (prefix f: or d:).
        #[arg(long = "include")]
        includes: Vec<String>,
        /// Regex that drops matching paths (prefix f: or d:).
        #[arg(long = "exclude")]
        excludes: Vec<String>,
    },
    /// Continue hashing files whose slots are still empty.
    Resume { db: Option<PathBuf> },
    /// Re-scan the stored root, carrying over unchanged digests.
    Update {
        db: Option<PathBuf>,
        /// Replace a leftover scratch file from an earlier run.
        #[arg(long)]
        force: bool,
    },
    /// List entries, optionally filtered by metadata predicates.
    List {
        db: Option<PathBuf>,
        /// Print bare relative paths only.
        #[arg(long)]
        minimal: bool,
        /// Include the path identifier in each line.
        #[arg(long)]
        full: bool,
        /// Show the stored content hash per entry.
        #[arg(long)]
        hash: bool,
        /// Stop after this many matches.
        #[arg(long)]
        limit: Option<u64>,
        /// Entry type selector (d, f, l, p, s).
        #[arg(long = "type")]
        type_selector: Option<String>,
        /// Size bound, e.g. +1m or -500k.
        #[arg(long)]
        size: Option<String>,
        /// Case-insensitive shell glob on the basename.
        #[arg(long)]
        iname: Option<String>,
        /// Case-insensitive regex on the path.
        #[arg(long)]
        i: Option<String>,
        /// Modified before this absolute or relative time.
        #[arg(long)]
        before: Option<String>,
        /// Modified after this absolute time.
        #[arg(long)]
        after: Option<String>,
        #[arg(long = "include")]
        includes: Vec<String>,
        #[arg(long = "exclude")]
        excludes: Vec<String>,
    },
    /// Print header, provenance and statistics of a database.
    Info { db: Option<PathBuf> },
    /// Render the snapshot as an indented tree.
    Tree {
        /// Database file, or a subpath when the database is defaulted.
        first: Option<String>,
        /// Subpath to start from.
        second: Option<String>,
        /// Directories only.
        #[arg(long)]
        dirs: bool,
    },
    /// Search entries with a path regex plus predicate flags.
    Search {
        /// Database file, or the expression when given alone.
        first: String,
        /// Search expression.
        second: Option<String>,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long = "type")]
        type_selector: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        iname: Option<String>,
        #[arg(long)]
        i: Option<String>,
        /// Content hash hex prefix.
        #[arg(long)]
        hash: Option<String>,
        /// Path identifier hex prefix.
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        before: Option<String>,
        #[arg(long)]
        after: Option<String>,
    },
    /// Compare two databases (or directories) for additions, removals and
    /// mutations.
    Diff {
        lhs: PathBuf,
        rhs: Option<PathBuf>,
        /// Also compare stored content hashes.
        #[arg(long)]
        hash: bool,
    },
    /// Show what still needs copying from lhs to rhs.
    Tosync {
        lhs: PathBuf,
        rhs: PathBuf,
        /// Compare content digests instead of entries.
        #[arg(long)]
        hash: bool,
    },
    /// Find duplicate files, or duplicate directories with --dirs.
    Dupes {
        db: Option<PathBuf>,
        /// Group duplicate subtrees instead of files.
        #[arg(long)]
        dirs: bool,
        /// Print the whole signatured tree.
        #[arg(long)]
        tree: bool,
    },
    /// Export the snapshot as CSV, JSON or hashdeep.
    Export {
        /// Database file, or the output path when given alone.
        first: PathBuf,
        /// Output path (`-` for stdout).
        second: Option<PathBuf>,
        #[arg(long, default_value = "csv")]
        format: String,
    },
    /// Verify the header against the file content; repair it on request.
    Fix {
        db: Option<PathBuf>,
        /// Report discrepancies without touching the file.
        #[arg(long)]
        dry_run: bool,
        /// Where to save the damaged header before rewriting.
        #[arg(long)]
        backup: Option<PathBuf>,
        /// Restore the header from an earlier backup instead.
        #[arg(long)]
        restore: Option<PathBuf>,
    },
    /// Generate shell completion.
    Completion { shell: Shell },
}

fn main() {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || cancel.cancel());
    }
    let config = CommonConfig {
        verbose: cli.verbose,
        progress: cli.progress,
        cancel,
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = dispatch(cli.command, &config, &mut stdout) {
        let _ = stdout.flush();
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn dispatch(command: Command, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    match command {
        Command::Scan {
            first,
            second,
            hash,
            algo,
            force,
            includes,
            excludes,
        } => {
            let (db, root) = match second {
                Some(root) => (first, root),
                None => (PathBuf::from(DEFAULT_DB_NAME), first),
            };
            scan(
                &ScanArgs {
                    db,
                    root,
                    hash,
                    algorithm: HashAlgorithm::from_str(&algo)?,
                    force,
                    includes,
                    excludes,
                },
                config,
                out,
            )
        }
        Command::Resume { db } => resume(
            &ResumeArgs {
                db: resolve_db_path(db),
            },
            config,
            out,
        ),
        Command::Update { db, force } => update(
            &UpdateArgs {
                db: resolve_db_path(db),
                force,
            },
            config,
            out,
        ),
        Command::List {
            db,
            minimal,
            full,
            hash,
            limit,
            type_selector,
            size,
            iname,
            i,
            before,
            after,
            includes,
            excludes,
        } => list(
            &ListArgs {
                db: resolve_db_path(db),
                minimal,
                full,
                show_hash: hash,
                limit,
                includes,
                excludes,
                predicates: PredicateArgs {
                    type_selector,
                    size,
                    iname,
                    iregex: i,
                    hash_prefix: None,
                    id_prefix: None,
                    before,
                    after,
                },
            },
            config,
            out,
        ),
        Command::Info { db } => info(
            &InfoArgs {
                db: resolve_db_path(db),
            },
            config,
            out,
        ),
        Command::Tree {
            first,
            second,
            dirs,
        } => {
            let (db, subpath) = match (first, second) {
                (Some(db), Some(subpath)) => (PathBuf::from(db), Some(subpath)),
                (Some(only), None) => {
                    // A lone argument is the database when it names a file,
                    // a subpath inside the default database otherwise.
                    let candidate = PathBuf::from(&only);
                    if candidate.is_file() {
                        (candidate, None)
                    } else {
                        (PathBuf::from(DEFAULT_DB_NAME), Some(only))
                    }
                }
                (None, _) => (PathBuf::from(DEFAULT_DB_NAME), None),
            };
            tree(
                &TreeArgs {
                    db,
                    subpath,
                    dirs_only: dirs,
                },
                config,
                out,
            )
        }
        Command::Search {
            first,
            second,
            limit,
            type_selector,
            size,
            iname,
            i,
            hash,
            id,
            before,
            after,
        } => {
            let (db, expression) = match second {
                Some(expression) => (PathBuf::from(first), expression),
                None => (PathBuf::from(DEFAULT_DB_NAME), first),
            };
            search(
                &SearchArgs {
                    db,
                    expression,
                    limit,
                    predicates: PredicateArgs {
                        type_selector,
                        size,
                        iname,
                        iregex: i,
                        hash_prefix: hash,
                        id_prefix: id,
                        before,
                        after,
                    },
                },
                config,
                out,
            )
        }
        Command::Diff { lhs, rhs, hash } => diff(
            &DiffArgs {
                lhs,
                rhs: rhs.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_NAME)),
                with_hashes: hash,
            },
            config,
            out,
        ),
        Command::Tosync { lhs, rhs, hash } => run_tosync(
            &ToSyncArgs {
                lhs,
                rhs,
                only_hashes: hash,
            },
            config,
            out,
        ),
        Command::Dupes { db, dirs, tree } => dupes(
            &DupesArgs {
                db: resolve_db_path(db),
                dirs,
                show_tree: tree,
            },
            config,
            out,
        ),
        Command::Export {
            first,
            second,
            format,
        } => {
            let (db, output) = match second {
                Some(output) => (first, output),
                None => (PathBuf::from(DEFAULT_DB_NAME), first),
            };
            run_export(
                &ExportArgs {
                    db,
                    output,
                    format: ExportFormat::from_str(&format)?,
                },
                config,
                out,
            )
        }
        Command::Fix {
            db,
            dry_run,
            backup,
            restore,
        } => run_fix(
            &FixArgs {
                db: resolve_db_path(db),
                dry_run,
                backup,
                restore,
            },
            config,
            out,
        ),
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ajfs", out);
            Ok(())
        }
    }
}
