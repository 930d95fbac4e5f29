//! mag-kernel CLI: waveform processing and harmonic analysis for magnetic
//! component operating points.
//!
//! This is the main entry point for the magnetic kernel tool.

mod config;
mod orchestrator;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_dsp::analysis::describe;
use lib_dsp::quick::{quick_operating_point, QuickOperatingPoint};
use lib_types::config::ProcessingConfig;
use lib_types::units::Hertz;
use lib_types::waveform::Waveform;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mag-kernel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Summary format written to disk and printed for single waveforms
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Complete every operating point of a run description
    Process {
        /// Path to the run description (TOML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory receiving the summary and completed operating points
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Describe a single waveform
    Analyze {
        /// Path to the waveform (CSV with time,value rows, or JSON)
        waveform: PathBuf,

        /// Fundamental frequency (Hz); defaults to the waveform's own period
        #[arg(long)]
        frequency: Option<f64>,

        /// Canonical resample count
        #[arg(long, default_value = "128")]
        number_points: usize,

        /// Keep every harmonic of oversampled captures
        #[arg(long)]
        no_trim: bool,
    },

    /// Build and complete an operating point from shape parameters
    Quick {
        /// Path to the quick operating point description (TOML or JSON)
        input: PathBuf,

        /// Directory receiving the summary and completed operating points
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = ["warn", "info", "debug"].get(usize::from(cli.verbose)).copied().unwrap_or("trace");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Commands::Process { config, output } => {
            run_process(&config, &output, cli.format)?;
        }
        Commands::Analyze { waveform, frequency, number_points, no_trim } => {
            let processing = ProcessingConfig {
                number_points,
                ..ProcessingConfig::default()
            }
            .with_trim(!no_trim);
            analyze(&waveform, frequency, &processing, cli.format)?;
        }
        Commands::Quick { input, output } => {
            run_quick(&input, &output, cli.format)?;
        }
    }

    Ok(())
}

fn run_process(config_path: &Path, output_dir: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading run description from {:?}", config_path);

    let config = config::load_config(config_path)?;
    let write_points = config.output.operating_points;
    let results = orchestrator::Orchestrator::new(config)?.run()?;

    std::fs::create_dir_all(output_dir)?;

    output::write_results(&results, output_dir, format, write_points)?;
    output::print_results(&results)?;

    tracing::info!("Run complete. Results written to {:?}", output_dir);
    Ok(())
}

/// Read a waveform from CSV (`time,value` rows, optional header) or JSON.
fn read_waveform(path: &Path) -> Result<Waveform> {
    if path.extension().map_or(false, |e| e == "json") {
        return config::read_document(path);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read waveform file: {:?}", path))?;

    let mut time = Vec::new();
    let mut data = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let (Some(t), Some(v)) = (fields.next(), fields.next()) else {
            anyhow::bail!("Line {} of {:?} is not a time,value pair", number + 1, path);
        };
        match (t.parse::<f64>(), v.parse::<f64>()) {
            (Ok(t), Ok(v)) => {
                time.push(t);
                data.push(v);
            }
            // Header row
            _ if time.is_empty() => continue,
            _ => anyhow::bail!("Line {} of {:?} has a non-numeric value", number + 1, path),
        }
    }

    Waveform::try_new(time, data).map_err(|e| anyhow::anyhow!("Invalid waveform in {:?}: {}", path, e))
}

fn analyze(path: &Path, frequency: Option<f64>, processing: &ProcessingConfig, format: OutputFormat) -> Result<()> {
    config::validate_processing(processing)?;
    tracing::info!("Analyzing waveform from {:?}", path);

    let waveform = read_waveform(path)?;
    let frequency = match frequency {
        Some(f) => Hertz(f),
        None => lib_dsp::sampling::period_of(&waveform, processing).to_frequency(),
    };

    let described = describe(waveform, frequency, None, processing)
        .with_context(|| format!("Failed to describe waveform from {:?}", path))?;
    let summary = orchestrator::SignalSummary::of(Some(&described))
        .context("Waveform produced no statistics")?;

    output::print_signal(&summary, format)
}

fn run_quick(input: &Path, output_dir: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Loading quick operating point from {:?}", input);

    let quick: QuickOperatingPoint = config::read_document(input)?;
    let processing = ProcessingConfig::default();
    let (point, requirements) = quick_operating_point(&quick, &processing)
        .with_context(|| format!("Failed to build operating point from {:?}", input))?;

    let config = config::RunConfig {
        name: point.name.clone().unwrap_or_else(|| "quick".to_string()),
        processing,
        design_requirements: requirements,
        operating_points: vec![point],
        output: config::OutputConfig::default(),
    };
    let results = orchestrator::Orchestrator::new(config)?.run()?;

    std::fs::create_dir_all(output_dir)?;
    output::write_results(&results, output_dir, format, true)?;
    output::print_results(&results)?;

    Ok(())
}
