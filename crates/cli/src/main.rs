use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use devmdx_cli::{BatchOptions, BatchReport, FileOutcome, QuarantineList, run_batch};
use devmdx_convert::{ConvertConfig, Pipeline};
use devmdx_core::{Diagnostics, validate_mdx};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "devmdx", version)]
#[command(about = "Convert legacy CMS Markdown/HTML pages to MDX")]
struct Cli {
    /// Raise the default log level to debug
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a source tree into one or more destination roots
    Convert(ConvertArgs),
    /// Convert files and report diagnostics without writing anything
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Converter configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the document tree as JSON
    Tree {
        /// File to parse
        file: PathBuf,
        /// Run the rewrite passes before printing
        #[arg(long)]
        lowered: bool,
        /// Converter configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Root of the source tree
    #[arg(long)]
    source: PathBuf,
    /// Destination root; repeat for versioned fan-out
    #[arg(long = "dest", required = true, num_args = 1..)]
    dests: Vec<PathBuf>,
    /// Converter configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extension of written documents
    #[arg(long, default_value = "mdx")]
    extension: String,
    /// Documents to skip, one relative path per line
    #[arg(long)]
    exclude_list: Option<PathBuf>,
    /// Add newly quarantined documents to the exclude list
    #[arg(long, requires = "exclude_list")]
    write_quarantine: bool,
    /// Worker threads (defaults to the number of CPU cores)
    #[arg(long)]
    jobs: Option<usize>,
    /// Convert without writing
    #[arg(long)]
    dry_run: bool,
    /// Skip sources whose destinations are newer
    #[arg(long)]
    incremental: bool,
    /// Compile every output as MDX and quarantine rejected documents
    #[arg(long)]
    validate: bool,
    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert(args) => convert(args),
        Command::Check { files, config } => check(&files, config.as_deref()),
        Command::Tree {
            file,
            lowered,
            config,
        } => tree(&file, lowered, config.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_pipeline(config: Option<&Path>) -> Result<Pipeline> {
    let config = match config {
        Some(path) => ConvertConfig::from_path(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => ConvertConfig::default(),
    };
    Ok(Pipeline::standard(config))
}

fn convert(args: ConvertArgs) -> Result<ExitCode> {
    let pipeline = load_pipeline(args.config.as_deref())?;
    let exclude = match &args.exclude_list {
        Some(path) => QuarantineList::load(path)?,
        None => QuarantineList::default(),
    };

    let options = BatchOptions {
        source: args.source,
        dests: args.dests,
        extension: args.extension.trim_start_matches('.').to_string(),
        jobs: args.jobs,
        dry_run: args.dry_run,
        incremental: args.incremental,
        validate: args.validate,
        exclude,
    };
    let report = run_batch(&pipeline, &options).context("batch conversion failed")?;
    print_report(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }

    let mut recorded = false;
    if args.write_quarantine
        && let Some(path) = &args.exclude_list
    {
        let mut list = options.exclude;
        let added = report.quarantined().filter(|p| list.insert(p)).count();
        if added > 0 && !args.dry_run {
            list.save(path)?;
            log::info!("added {added} documents to {}", path.display());
        }
        recorded = true;
    }

    let quarantine_fails = report.stats.quarantined > 0 && !recorded;
    Ok(if report.stats.failed > 0 || quarantine_fails {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &BatchReport) {
    for file in &report.files {
        for diagnostic in &file.diagnostics {
            eprintln!("{diagnostic}");
        }
        if let FileOutcome::Failed { error } = &file.outcome {
            eprintln!("{}: error: {error}", file.relative.display());
        }
    }
    let stats = &report.stats;
    eprintln!(
        "{} documents: {} converted, {} up to date, {} excluded, {} quarantined, {} failed ({:.0} ms)",
        stats.total,
        stats.converted,
        stats.up_to_date,
        stats.excluded,
        stats.quarantined,
        stats.failed,
        stats.processing_time_ms
    );
}

fn check(files: &[PathBuf], config: Option<&Path>) -> Result<ExitCode> {
    let pipeline = load_pipeline(config)?;
    let mut rejected = 0;
    for file in files {
        let raw = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let name = file.display().to_string();
        let converted = pipeline.transform(&name, &raw);
        for diagnostic in &converted.diagnostics {
            eprintln!("{diagnostic}");
        }
        let compiled = validate_mdx(&converted.output, &name);
        if let Err(err) = &compiled {
            eprintln!("{name}: fatal: output rejected by the MDX compiler: {err}");
        }
        if converted.has_fatal() || compiled.is_err() {
            rejected += 1;
        }
    }
    eprintln!("{} checked, {rejected} rejected", files.len());
    Ok(if rejected > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn tree(file: &Path, lowered: bool, config: Option<&Path>) -> Result<ExitCode> {
    let pipeline = load_pipeline(config)?;
    let raw =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let mut diagnostics = Diagnostics::new(file.display().to_string());
    let tree = if lowered {
        pipeline.tree(&raw, &mut diagnostics)
    } else {
        pipeline.normalized_tree(&raw, &mut diagnostics)
    };
    println!("{}", serde_json::to_string_pretty(&tree)?);
    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }
    Ok(ExitCode::SUCCESS)
}
