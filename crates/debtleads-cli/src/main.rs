mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use arrow::record_batch::RecordBatch;
use clap::{Args, Parser, Subcommand};
use debtleads_core::{Amount, MatchStrategy, Settings};
use debtleads_pipeline::{Pipeline, report};
use debtleads_service::{AppState, FileDebtSource, MemoryJobStore};
use debtleads_source::{
    DelimitedOptions, ReportFormat, ReportWriter, discover_plan_files, read_delimited, read_many,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "debtleads", version, about = "Filter, aggregate and cross-reference tax-debt records")]
struct Cli {
    /// TOML settings file; defaults apply when omitted.
    #[arg(long, global = true, env = "DEBTLEADS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and write the reports.
    Run(RunArgs),
    /// Start the HTTP job service.
    Serve(ServeArgs),
    /// Show the columns and first rows of delimited files.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Raw debt files (part files are concatenated).
    #[arg(long, required = true, num_args = 1..)]
    debts: Vec<PathBuf>,

    /// Installment-plan exports.
    #[arg(long, num_args = 1..)]
    plans: Vec<PathBuf>,

    /// Directory scanned for plan exports by file-name prefix.
    #[arg(long)]
    plan_dir: Option<PathBuf>,

    /// Keep debts strictly above this amount.
    #[arg(long, value_parser = parse_amount)]
    minimum: Option<Amount>,

    /// Two-letter region code to keep.
    #[arg(long)]
    jurisdiction: Option<String>,

    /// `row` (one row per debtor/plan pair) or `summary` (one row per debtor).
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<MatchStrategy>,

    #[arg(long, default_value = "csv", value_parser = parse_format)]
    format: ReportFormat,

    #[arg(long, default_value = "output")]
    out: PathBuf,
}

#[derive(Args)]
struct ServeArgs {
    /// Raw debt files loaded for every job; overrides `service.debt_files`.
    #[arg(long, num_args = 1..)]
    debts: Vec<PathBuf>,

    #[arg(long, env = "DEBTLEADS_BIND")]
    bind: Option<String>,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Read with the plan-export layout instead of the debt layout.
    #[arg(long)]
    plan: bool,

    #[arg(long, default_value_t = 5)]
    rows: usize,
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    Amount::parse(raw).ok_or_else(|| format!("{raw:?} is not a number"))
}

fn parse_strategy(raw: &str) -> Result<MatchStrategy, String> {
    raw.parse().map_err(|e: debtleads_core::ConfigError| e.to_string())
}

fn parse_format(raw: &str) -> Result<ReportFormat, String> {
    raw.parse()
        .map_err(|e: debtleads_source::SourceError| e.to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.config.as_deref())
        .context("failed to load settings")?;
    info!("debtleads v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run(args) => run(settings, args),
        Command::Serve(args) => serve(settings, args),
        Command::Inspect(args) => inspect(&settings, args),
    }
}

fn run(mut settings: Settings, args: RunArgs) -> anyhow::Result<()> {
    if let Some(jurisdiction) = args.jurisdiction {
        settings.filter.jurisdiction = jurisdiction;
    }
    settings.validate()?;

    let raw = read_many(&args.debts, &DelimitedOptions::from_format(&settings.debts)?)
        .context("failed to read debt files")?;

    let plan_paths = plan_paths(&settings, &args.plans, args.plan_dir.as_deref())?;
    let plan_tables = if plan_paths.is_empty() {
        None
    } else {
        let options = DelimitedOptions::from_format(&settings.plans.format)?;
        let tables = plan_paths
            .iter()
            .map(|p| read_delimited(p, &options))
            .collect::<Result<Vec<RecordBatch>, _>>()
            .context("failed to read plan files")?;
        Some(tables)
    };

    let mut pipeline = Pipeline::new(&settings)?;
    if let Some(minimum) = args.minimum {
        pipeline = pipeline.with_minimum(minimum)?;
    }
    if let Some(strategy) = args.strategy {
        pipeline = pipeline.with_strategy(strategy);
    }
    let output = pipeline.run(&raw, plan_tables.as_deref())?;

    let mut tables = vec![
        ("detailed", output.detailed.clone()),
        ("debtors", report::debtors_batch(&output.debtors)?),
    ];
    if let Some(outcome) = &output.matches {
        tables.extend(report::outcome_batches(outcome)?);
    }
    let writer = ReportWriter::new(&args.out, args.format);
    let written = writer.write_all(&tables)?;

    display::print_run_summary(&output.stats, &output.debtors, output.matches.as_ref());
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Explicit plan files plus any discovered under `dir`, without duplicates.
fn plan_paths(settings: &Settings, explicit: &[PathBuf], dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = explicit.to_vec();
    if let Some(dir) = dir {
        for path in discover_plan_files(dir, &settings.plans.file_prefix, &settings.plans.file_extension)? {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

fn serve(mut settings: Settings, args: ServeArgs) -> anyhow::Result<()> {
    if !args.debts.is_empty() {
        settings.service.debt_files = args.debts;
    }
    if let Some(bind) = args.bind {
        settings.service.bind = bind;
    }
    settings.validate()?;
    if settings.service.debt_files.is_empty() {
        bail!("no debt files: pass --debts or set service.debt_files");
    }

    let debts = FileDebtSource::new(
        settings.service.debt_files.clone(),
        DelimitedOptions::from_format(&settings.debts)?,
    );
    let store = MemoryJobStore::with_capacity(settings.service.max_finished_jobs);
    let state = AppState::new(settings, Arc::new(store), Arc::new(debts));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(debtleads_service::serve(state))?;
    Ok(())
}

fn inspect(settings: &Settings, args: InspectArgs) -> anyhow::Result<()> {
    let format = if args.plan {
        &settings.plans.format
    } else {
        &settings.debts
    };
    let options = DelimitedOptions::from_format(format)?;
    for path in &args.files {
        let batch = read_delimited(path, &options)
            .with_context(|| format!("failed to read {}", path.display()))?;
        println!("=== {} ===", path.display());
        display::print_table_overview(&batch, args.rows)?;
    }
    Ok(())
}
