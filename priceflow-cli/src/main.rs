//! priceflow CLI: run, demo, and inspect commands.
//!
//! Commands:
//! - `run`: run one pipeline from a TOML config file or from flags
//! - `demo`: run the equity and crypto pipelines side by side and print both frames
//! - `inspect`: list the artifacts in a destination directory with row counts

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use priceflow_core::Frame;
use priceflow_runner::{
    list_artifacts, run_batch, OutputFormat, PipelineConfig, RunSummary, SourceConfig,
    SyntheticExtractor,
};

#[derive(Parser)]
#[command(
    name = "priceflow",
    about = "priceflow: extract, clean, featurize and persist price series"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline from a TOML config file or from flags.
    Run(RunArgs),
    /// Run the equity and crypto pipelines and print both frames.
    Demo {
        /// Parent directory; outputs go to DEST/equities and DEST/crypto.
        #[arg(long, default_value = "data")]
        dest: PathBuf,

        /// Run the two pipelines one after the other instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// List artifacts in a destination directory with their row counts.
    Inspect {
        /// Destination directory written by `run` or `demo`.
        dir: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to a TOML pipeline file. Other flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source to extract from (required without --config).
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Symbols to request (comma separated or repeated). Defaults to the source's own symbols.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    symbols: Vec<String>,

    /// Destination directory. Defaults to data/<source>.
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Artifact format.
    #[arg(long, value_enum)]
    format: Option<FormatKind>,

    /// Directory of raw <symbol>.csv files (with --source csv).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Synthetic start date (YYYY-MM-DD). Defaults to one year before --end.
    #[arg(long)]
    start: Option<String>,

    /// Synthetic end date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Label used in logs and the summary.
    #[arg(long)]
    label: Option<String>,

    /// Print a JSON run summary instead of the frame.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Equity,
    Crypto,
    Synthetic,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatKind {
    Csv,
    Parquet,
}

impl From<FormatKind> for OutputFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Csv => OutputFormat::Csv,
            FormatKind::Parquet => OutputFormat::Parquet,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run_pipeline_cmd(args),
        Commands::Demo { dest, sequential } => run_demo(&dest, !sequential),
        Commands::Inspect { dir } => run_inspect(&dir),
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

fn run_pipeline_cmd(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let label = config.label();
    let pipeline = config
        .build_pipeline()
        .with_context(|| format!("invalid pipeline '{label}'"))?;

    let (frame, report) = pipeline
        .run_with_report(config.symbols.clone(), &config.destination)
        .with_context(|| format!("pipeline '{label}' failed"))?;
    let summary = RunSummary::new(label, &frame, &report);

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print_frame(&summary.label, &frame);
        print_summary(&summary);
    }
    Ok(())
}

/// Merge a config file (if any) with command-line overrides.
fn resolve_config(args: &RunArgs) -> Result<PipelineConfig> {
    let source = args.source.map(|kind| build_source(kind, args)).transpose()?;

    let mut config = match (&args.config, source) {
        (Some(path), source) => {
            let mut config = PipelineConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if let Some(source) = source {
                config.source = source;
            }
            config
        }
        (None, Some(source)) => {
            let dest = PathBuf::from("data").join(source_name(&source));
            let symbols = source.default_symbols();
            PipelineConfig::new(source, symbols, dest)
        }
        (None, None) => anyhow::bail!("one of --config or --source is required"),
    };

    if !args.symbols.is_empty() {
        config.symbols = args.symbols.clone();
    }
    if let Some(dest) = &args.dest {
        config.destination = dest.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(label) = &args.label {
        config.label = Some(label.clone());
    }
    debug!(
        label = %config.label(),
        source = ?config.source,
        symbols = ?config.symbols,
        "resolved config"
    );
    Ok(config)
}

fn build_source(kind: SourceKind, args: &RunArgs) -> Result<SourceConfig> {
    Ok(match kind {
        SourceKind::Equity => SourceConfig::Equity,
        SourceKind::Crypto => SourceConfig::Crypto,
        SourceKind::Csv => SourceConfig::Csv {
            dir: args
                .input
                .clone()
                .context("--input DIR is required with --source csv")?,
        },
        SourceKind::Synthetic => {
            let end = parse_date(args.end.as_deref())?
                .unwrap_or_else(|| Utc::now().date_naive());
            let start = parse_date(args.start.as_deref())?
                .unwrap_or(end - Duration::days(365));
            SourceConfig::Synthetic {
                start,
                end,
                initial_price: SyntheticExtractor::DEFAULT_INITIAL_PRICE,
            }
        }
    })
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn source_name(source: &SourceConfig) -> &'static str {
    match source {
        SourceConfig::Equity => "equities",
        SourceConfig::Crypto => "crypto",
        SourceConfig::Synthetic { .. } => "synthetic",
        SourceConfig::Csv { .. } => "csv",
    }
}

fn run_demo(dest: &Path, parallel: bool) -> Result<()> {
    let configs = [
        PipelineConfig::new(
            SourceConfig::Equity,
            SourceConfig::Equity.default_symbols(),
            dest.join("equities"),
        ),
        PipelineConfig::new(
            SourceConfig::Crypto,
            SourceConfig::Crypto.default_symbols(),
            dest.join("crypto"),
        ),
    ];
    let jobs = configs
        .iter()
        .map(|c| c.to_job())
        .collect::<Result<Vec<_>, _>>()?;

    let outcomes = run_batch(&jobs, parallel).context("demo failed")?;

    for outcome in &outcomes {
        print_frame(&outcome.label, &outcome.frame);
    }
    for outcome in &outcomes {
        print_summary(&outcome.summary());
    }
    Ok(())
}

fn run_inspect(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let artifacts =
        list_artifacts(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    if artifacts.is_empty() {
        println!("No artifacts in {}", dir.display());
        return Ok(());
    }

    println!("Destination: {}", dir.display());
    println!("Artifacts:   {}", artifacts.len());
    println!();
    println!("{:<12} {:>6}  {}", "Symbol", "Rows", "File");
    println!("{}", "-".repeat(48));
    for artifact in &artifacts {
        let file = artifact
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{:<12} {:>6}  {}", artifact.symbol, artifact.rows, file);
    }
    Ok(())
}

fn print_frame(label: &str, frame: &Frame) {
    println!("{label}:");
    println!("{frame}");
    println!();
}

fn print_summary(summary: &RunSummary) {
    println!("=== {} ===", summary.label);
    println!("Symbols:     {}", summary.symbols.join(", "));
    if !summary.missing_symbols.is_empty() {
        println!("Missing:     {}", summary.missing_symbols.join(", "));
    }
    println!("Rows:        {}", summary.rows);
    println!("Destination: {}", summary.destination.display());
    for artifact in &summary.artifacts {
        println!("  {}", artifact.display());
    }
    println!("Frame hash:  {}", summary.frame_hash);
    println!();
}
