//! rigscan - offshore platform corrosion inspection
//!
//! Usage:
//!   rigscan --platform PLT-7 --area "splash zone"          → simulated readings and sample images
//!   rigscan -p PLT-7 -a deck --sensor log.csv --image a.jpg → real inputs
//!   rigscan --print-config                                  → effective config as TOML

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rigscan_pipeline::{InspectionAgent, InspectionConfig, InspectionRequest, RunSummary};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "rigscan",
    about = "Corrosion inspection pipeline: intake, analysis, risk scoring, report",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Platform identifier
    #[arg(short, long, default_value = "PLATFORM_001")]
    platform: String,

    /// Inspected area of the platform
    #[arg(short, long, default_value = "main_deck")]
    area: String,

    /// Inspection image (repeatable)
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,

    /// Sensor log: .json, .csv or .txt (repeatable)
    #[arg(short, long = "sensor")]
    sensors: Vec<PathBuf>,

    /// Calling convention of the run
    #[arg(short, long, value_enum, default_value_t = RunMode::Sync)]
    mode: RunMode,

    /// Path to config file (TOML). Default: <config dir>/rigscan/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for reports and images (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Record unrecognized stage output as a failure
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Write logs to a file (in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the effective config and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RunMode {
    Sync,
    Async,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let config = load_config(&cli)?;
    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let agent = InspectionAgent::from_config(config).context("invalid configuration")?;
    tracing::info!(advisor = agent.advisor_name(), mode = ?cli.mode, "rigscan ready");

    let request = InspectionRequest::new(&cli.platform, &cli.area)
        .with_images(cli.images.clone())
        .with_sensors(cli.sensors.clone());
    let state = match cli.mode {
        RunMode::Sync => agent.run_inspection_sync(&request),
        RunMode::Async => futures::executor::block_on(agent.run_inspection(&request)),
    };

    let summary = RunSummary::from_state(&state);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    match &summary.report_id {
        Some(id) => println!("report: {}", id),
        None => println!("no report generated (stopped at '{}')", summary.final_stage),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<InspectionConfig> {
    let path = cli.config.clone().or_else(InspectionConfig::default_path);
    let mut config = match &path {
        Some(path) => InspectionConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => InspectionConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("invalid RIGSCAN_* environment override")?;

    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.strict {
        config.graph.mode = rigscan_graph::CompileMode::Strict;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Stderr logging plus an optional non-blocking file layer. The returned
/// guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .with_context(|| format!("log file path has no file name: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rigscan=info,rigscan_pipeline=info,rigscan_graph=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}
