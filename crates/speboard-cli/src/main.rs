//! speboard CLI - SPE onboarding portfolio
//!
//! Command-line shell for importing the three spreadsheet sources,
//! rendering the portfolio and recording local updates.

mod config;
mod sample;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use speboard_core::dates::start_of_day;
use speboard_core::portfolio::{phase_efficiency, PhaseEfficiency, PortfolioStatus};
use speboard_core::{Entity, Renderer, TaskStatus, Timestamp, UpdateEntry, UpdateKind};
use speboard_engine::{EntityChange, JsonFileRepository, PortfolioStore, ReconcileReport};
use speboard_parser::TabularSources;
use speboard_render::{ExcelRenderer, MilestoneCalendarRenderer, TextRenderer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "speboard")]
#[command(author, version, about = "SPE onboarding portfolio engine", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file
    #[arg(long, global = true, env = "SPEBOARD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// The three spreadsheet sources and the reference date
#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Process register (one row per SPE)
    #[arg(long, value_name = "FILE")]
    processes: PathBuf,

    /// Track register (one row per SPE and phase)
    #[arg(long, value_name = "FILE")]
    tracks: PathBuf,

    /// Task register (one row per task)
    #[arg(long, value_name = "FILE")]
    tasks: PathBuf,

    /// Reference date (YYYY-MM-DD), defaults to now
    #[arg(long, value_name = "DATE")]
    as_of: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the sources and print the portfolio dashboard
    Import {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the portfolio summary
    Status {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the XLSX portfolio report
    Report {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Leave entities without a registered process out of the report
        #[arg(long)]
        hide_ghosts: bool,
    },

    /// Print a Mermaid calendar of the upcoming milestones
    Calendar {
        #[command(flatten)]
        sources: SourceArgs,

        /// Window length in days from the reference date
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Include open task due dates
        #[arg(long)]
        tasks_due: bool,
    },

    /// Add a journal entry to an entity
    Comment {
        #[command(flatten)]
        sources: SourceArgs,

        /// Process identifier
        #[arg(long)]
        process: String,

        /// Entry kind (general, blocker, progress)
        #[arg(long, default_value = "general")]
        kind: String,

        /// Entry text
        #[arg(long)]
        text: String,
    },

    /// Change the status of a task
    SetStatus {
        #[command(flatten)]
        sources: SourceArgs,

        /// Process identifier
        #[arg(long)]
        process: String,

        /// Task identifier (e.g. P-001-T003)
        #[arg(long)]
        task: String,

        /// New status (on_track, at_risk, delayed, blocked, completed)
        #[arg(long)]
        status: String,
    },

    /// Write a deterministic sample portfolio as three spreadsheets
    Sample {
        /// Output directory
        #[arg(long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Number of registered entities
        #[arg(long, default_value_t = 12)]
        entities: usize,

        /// Add task rows for unregistered processes
        #[arg(long)]
        orphans: bool,

        /// Reference date (YYYY-MM-DD), defaults to now
        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Import {
            sources,
            format,
            output,
        } => cmd_import(&config, &sources, format, output.as_deref()),
        Commands::Status { sources, format } => cmd_status(&config, &sources, format),
        Commands::Report {
            sources,
            output,
            hide_ghosts,
        } => cmd_report(&config, &sources, &output, hide_ghosts),
        Commands::Calendar {
            sources,
            days,
            tasks_due,
        } => cmd_calendar(&config, &sources, days, tasks_due),
        Commands::Comment {
            sources,
            process,
            kind,
            text,
        } => cmd_comment(&config, &sources, &process, &kind, &text),
        Commands::SetStatus {
            sources,
            process,
            task,
            status,
        } => cmd_set_status(&config, &sources, &process, &task, &status),
        Commands::Sample {
            output_dir,
            entities,
            orphans,
            as_of,
        } => cmd_sample(&output_dir, entities, orphans, reference_time(as_of)),
    }
}

/// `RUST_LOG` wins; otherwise warn, raised by each `-v`
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn reference_time(as_of: Option<NaiveDate>) -> Timestamp {
    as_of.map_or_else(Utc::now, start_of_day)
}

// ============================================================================
// Import plumbing
// ============================================================================

fn read_sources(args: &SourceArgs) -> Result<TabularSources> {
    let read = |path: &Path| std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()));
    Ok(TabularSources {
        processes: read(&args.processes)?,
        tracks: read(&args.tracks)?,
        tasks: read(&args.tasks)?,
    })
}

fn open_store(config: &Config, args: &SourceArgs) -> Result<(PortfolioStore<JsonFileRepository>, Timestamp)> {
    let now = reference_time(args.as_of);
    let sources = read_sources(args)?;
    let repository = JsonFileRepository::new(&config.annotations.path);
    let mut store = PortfolioStore::new(repository, config.import, now);
    let snapshot = store.import(&sources, now).context("Import failed")?;

    let report = &snapshot.report;
    if report.ghost_entities > 0 {
        eprintln!(
            "warning: {} process id(s) referenced by tasks are not registered",
            report.ghost_entities
        );
    }
    Ok((store, now))
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Serialize)]
struct SnapshotJson<'a> {
    as_of: Timestamp,
    report: &'a ReconcileReport,
    entities: &'a [Entity],
}

#[derive(Serialize)]
struct StatusJson<'a> {
    report: &'a ReconcileReport,
    status: PortfolioStatus,
    efficiency: Vec<PhaseEfficiency>,
}

fn cmd_import(config: &Config, args: &SourceArgs, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let (store, now) = open_store(config, args)?;
    let snapshot = store.snapshot();

    let content = match format {
        OutputFormat::Text => TextRenderer::new().render(&snapshot.entities, now)?,
        OutputFormat::Json => {
            let json = SnapshotJson {
                as_of: snapshot.as_of,
                report: &snapshot.report,
                entities: &snapshot.entities,
            };
            format!("{}\n", serde_json::to_string_pretty(&json)?)
        }
    };
    write_output(output, &content)
}

fn cmd_status(config: &Config, args: &SourceArgs, format: OutputFormat) -> Result<()> {
    let (store, now) = open_store(config, args)?;
    let snapshot = store.snapshot();

    let content = match format {
        OutputFormat::Text => TextRenderer::new().summary_only().render(&snapshot.entities, now)?,
        OutputFormat::Json => {
            let json = StatusJson {
                report: &snapshot.report,
                status: PortfolioStatus::from_entities(&snapshot.entities, now),
                efficiency: phase_efficiency(&snapshot.entities, now),
            };
            format!("{}\n", serde_json::to_string_pretty(&json)?)
        }
    };
    write_output(None, &content)
}

fn cmd_report(config: &Config, args: &SourceArgs, output: &Path, hide_ghosts: bool) -> Result<()> {
    let (store, now) = open_store(config, args)?;
    let snapshot = store.snapshot();

    let mut renderer = ExcelRenderer::new();
    if hide_ghosts {
        renderer = renderer.hide_ghosts();
    }
    let bytes = renderer.render(&snapshot.entities, now)?;
    std::fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

fn cmd_calendar(config: &Config, args: &SourceArgs, days: i64, tasks_due: bool) -> Result<()> {
    if days < 0 {
        bail!("--days must not be negative");
    }
    let (store, now) = open_store(config, args)?;
    let snapshot = store.snapshot();
    let Some(until) = Duration::try_days(days).and_then(|span| now.checked_add_signed(span)) else {
        bail!("--days {days} reaches past the supported date range");
    };

    let mut renderer = MilestoneCalendarRenderer::new()
        .title(format!("Marcos de {} a {}", now.format("%d/%m"), until.format("%d/%m")))
        .window(now, until);
    if tasks_due {
        renderer = renderer.with_task_due_dates();
    }
    write_output(None, &renderer.render(&snapshot.entities, now)?)
}

fn cmd_comment(config: &Config, args: &SourceArgs, process: &str, kind: &str, text: &str) -> Result<()> {
    let Some(kind) = UpdateKind::from_name(kind) else {
        bail!("Unknown entry kind '{kind}' (expected general, blocker or progress)");
    };
    if text.trim().is_empty() {
        bail!("Entry text must not be empty");
    }

    let (mut store, now) = open_store(config, args)?;
    let entry = UpdateEntry::user(&config.annotations.author, kind, text.trim(), now);
    let id = entry.id.clone();
    store
        .apply_change(process, EntityChange::AddUpdate { entry }, now)
        .with_context(|| format!("Failed to update {process}"))?;

    println!("Added {} entry {id} to {process}", kind.as_str().to_lowercase());
    Ok(())
}

fn cmd_set_status(config: &Config, args: &SourceArgs, process: &str, task: &str, status: &str) -> Result<()> {
    let Some(status) = TaskStatus::from_name(status) else {
        let known: Vec<String> = TaskStatus::ALL
            .iter()
            .map(|s| s.as_str().to_lowercase().replace(' ', "_"))
            .collect();
        bail!("Unknown status '{status}' (expected one of: {})", known.join(", "));
    };

    let (mut store, now) = open_store(config, args)?;
    let snapshot = store
        .apply_change(
            process,
            EntityChange::SetTaskStatus {
                task_id: task.to_string(),
                status,
            },
            now,
        )
        .with_context(|| format!("Failed to update {process}"))?;

    if let Some(entity) = snapshot.entity(process) {
        println!(
            "{task}: {} ({process} now {}, {}%)",
            status.as_str(),
            entity.overall_status.as_str(),
            entity.progress()
        );
    }
    Ok(())
}

fn cmd_sample(dir: &Path, entities: usize, orphans: bool, as_of: Timestamp) -> Result<()> {
    if entities == 0 {
        bail!("--entities must be at least 1");
    }
    let tables = sample::sample_tables(entities, orphans, as_of);
    for path in sample::write_sample(dir, &tables)? {
        println!("{}", path.display());
    }
    Ok(())
}
