//! comics: host process for the on-device comics store.
//!
//! # Usage
//!
//! ```bash
//! comics --data-dir ./documents --bundle-dir ./resources init
//! comics import info.0.json
//! comics list --output json
//! comics run
//! ```
//!
//! Environment variables can also be used:
//! - `COMICS_DATA_DIR`: Directory holding comics.sqlite
//! - `COMICS_BUNDLE_DIR`: Directory holding the bundled template
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comics_store::config::Config;
use comics_store::lifecycle::{until_shutdown, ShutdownSignal};
use comics_store::observability::tracing::init_tracing;
use comics_store::storage::comic::{Comic, ComicInfo};
use comics_store::storage::schema::{write_template, Schema};
use comics_store::{Opened, SaveOutcome, StartupReport, Store};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Host process for the on-device comics store.
#[derive(Parser, Debug)]
#[command(name = "comics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write an empty template store for bundling
    MakeTemplate {
        /// Output path
        out: PathBuf,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Subcommands that run against an opened store.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Open the store and print the startup report
    Init,
    /// List every comic
    List,
    /// Show one comic
    Show {
        /// Comic number
        number: i64,
    },
    /// Show the highest numbered comic
    Latest,
    /// Import xkcd info.0.json documents and save
    Import {
        /// JSON files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete every comic and save
    DeleteAll,
    /// Hold the session open until SIGINT/SIGTERM, then flush
    Run,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(&cli.config.log_level, cli.config.log_format);

    match &cli.command {
        Commands::MakeTemplate { out } => {
            make_template(out)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Store(command) => run_store(&cli, command).await,
    }
}

fn make_template(out: &Path) -> Result<()> {
    let schema = Schema::load().context("loading schema")?;
    write_template(out, &schema)
        .with_context(|| format!("writing template to {}", out.display()))?;
    println!("Wrote template {}", out.display());
    Ok(())
}

async fn run_store(cli: &Cli, command: &StoreCommand) -> Result<ExitCode> {
    let prepared =
        Store::prepare(&cli.config.store_options()).context("preparing the comics store")?;

    let warnings = prepared.report().warnings.len();
    if cli.config.strict && warnings > 0 {
        bail!("store would start degraded with {warnings} warning(s) and --strict is set");
    }

    let Opened { store, report } = prepared.attach().context("opening the comics store")?;

    // Installed before any work so a signal always reaches the termination hook.
    let signal = ShutdownSignal::install().context("installing signal handlers")?;
    let shutdown = async move {
        if let Err(e) = signal.recv().await {
            tracing::error!(error = %e, "Shutdown signal unavailable");
            std::future::pending::<()>().await;
        }
    };

    let result = until_shutdown(run_command(cli.output, command, &store, &report), shutdown).await;

    let outcome = store.shutdown().await;
    if let Some(result) = result {
        result?;
    }
    Ok(ExitCode::from(outcome.exit_status()))
}

async fn run_command(
    output: OutputFormat,
    command: &StoreCommand,
    store: &Store,
    report: &StartupReport,
) -> Result<()> {
    let session = store.session();
    let mut stdout = std::io::stdout().lock();

    match command {
        StoreCommand::Init => match output {
            OutputFormat::Json => {
                let warnings: Vec<String> =
                    report.warnings.iter().map(ToString::to_string).collect();
                let value = serde_json::json!({
                    "store_path": report.store_path,
                    "legacy_removed": report.legacy_removed,
                    "seeded": report.seeded,
                    "warnings": warnings,
                    "comics": session.count().await?,
                });
                writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
            }
            OutputFormat::Text => {
                writeln!(stdout, "Store:          {}", report.store_path.display())?;
                writeln!(stdout, "Legacy removed: {}", report.legacy_removed)?;
                writeln!(stdout, "Seeded:         {}", report.seeded)?;
                writeln!(stdout, "Comics:         {}", session.count().await?)?;
                for warning in &report.warnings {
                    writeln!(stdout, "Warning:        {}", warning)?;
                }
            }
        },
        StoreCommand::List => {
            let comics = session.all_comics().await?;
            print_comics(&mut stdout, output, &comics)?;
        }
        StoreCommand::Show { number } => {
            let Some(comic) = session.comic(*number).await? else {
                bail!("comic {} not found", number);
            };
            print_comics(&mut stdout, output, std::slice::from_ref(&comic))?;
        }
        StoreCommand::Latest => {
            let Some(comic) = session.last_known_comic().await? else {
                bail!("store has no comics");
            };
            print_comics(&mut stdout, output, std::slice::from_ref(&comic))?;
        }
        StoreCommand::Import { files } => {
            for file in files {
                let text = fs::read_to_string(file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let info: ComicInfo = serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", file.display()))?;
                session.upsert(Comic::from(info)).await?;
            }
            report_save(&mut stdout, store.save().await)?;
        }
        StoreCommand::DeleteAll => {
            let deleted = session.delete_all_comics().await?;
            writeln!(stdout, "Deleted {} comic(s)", deleted)?;
            report_save(&mut stdout, store.save().await)?;
        }
        StoreCommand::Run => {
            writeln!(stdout, "Store ready at {}", store.store_path().display())?;
            stdout.flush()?;
            drop(stdout);
            // Only the shutdown signal ends this command.
            std::future::pending::<()>().await;
        }
    }

    Ok(())
}

fn print_comics(out: &mut impl Write, format: OutputFormat, comics: &[Comic]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(comics)?)?;
        }
        OutputFormat::Text => {
            for comic in comics {
                writeln!(out, "{:>5}  {}  {}", comic.number, comic.name, comic.website_url())?;
            }
        }
    }
    Ok(())
}

fn report_save(out: &mut impl Write, outcome: Option<SaveOutcome>) -> Result<()> {
    match outcome {
        Some(SaveOutcome::Saved { changes }) => writeln!(out, "Saved {} change(s)", changes)?,
        Some(SaveOutcome::Clean) => writeln!(out, "Nothing to save")?,
        None => writeln!(out, "Save failed; see the log for details")?,
    }
    Ok(())
}
