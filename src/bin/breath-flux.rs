//! Breath Flux CLI - Command-line interface for Breath Flux
//!
//! Commands:
//! - analyze: Run the full analysis over candidate records
//! - validate: Check that candidate records can be loaded
//! - config: Print the default pipeline configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use breath_flux::adapter::{BreathActivityAdapter, RecordAdapter};
use breath_flux::config::{AggregationPolicy, PipelineConfig};
use breath_flux::encoder::ReportEncoder;
use breath_flux::pipeline::AnalysisProcessor;
use breath_flux::types::{Candidate, ItemFailure};
use breath_flux::{ComputeError, FLUX_VERSION};

/// Breath Flux - Offline analysis of pupillary and respiratory signals
#[derive(Parser)]
#[command(name = "breath-flux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Compute pupillary activity indices and grand averages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze candidate records and write the report
    Analyze {
        /// Input JSON file or directory of JSON files (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Grand-average aggregation policy (overrides the configuration)
        #[arg(long)]
        policy: Option<Policy>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Check that candidate records can be loaded
    Validate {
        /// Input JSON file or directory of JSON files (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default pipeline configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum Policy {
    /// Running pairwise mean
    Pairwise,
    /// True arithmetic mean
    Mean,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BreathCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            policy,
            output_format,
        } => cmd_analyze(&input, &output, config.as_deref(), policy, output_format),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    policy: Option<Policy>,
    output_format: OutputFormat,
) -> Result<(), BreathCliError> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(policy) = policy {
        config.aggregation = match policy {
            Policy::Pairwise => AggregationPolicy::Pairwise,
            Policy::Mean => AggregationPolicy::IncrementalMean,
        };
    }

    let (candidates, record_failures) = load_candidates(input)?;
    if candidates.is_empty() {
        return Err(BreathCliError::NoCandidates);
    }

    let processor = AnalysisProcessor::with_config(config);
    let mut report = processor.analyze(&candidates);
    let stage_failures = std::mem::replace(&mut report.failures, record_failures);
    report.failures.extend(stage_failures);

    let encoder = ReportEncoder::new();
    let output_data = match output_format {
        OutputFormat::Json => encoder.encode_to_json_compact(&report)?,
        OutputFormat::JsonPretty => encoder.encode_to_json(&report)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
        info!(path = %output.display(), "report written");
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), BreathCliError> {
    let (candidates, failures) = load_candidates(input)?;

    let report = ValidationReport {
        candidates: candidates.len(),
        stages: candidates.iter().map(|c| c.stages.len()).sum(),
        invalid_records: failures.len(),
        errors: failures,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Candidates:      {}", report.candidates);
        println!("Stages:          {}", report.stages);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} [{}]: {}", err.item, err.code, err.message);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(BreathCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

/// Load candidates from stdin, a file, or every `.json` file of a directory
fn load_candidates(input: &Path) -> Result<(Vec<Candidate>, Vec<ItemFailure>), BreathCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(BreathActivityAdapter.parse_batch(&buffer)?);
    }

    let files = if input.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    } else {
        vec![input.to_path_buf()]
    };

    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    for file in files {
        let name = file.display().to_string();
        let contents = fs::read_to_string(&file)?;
        match BreathActivityAdapter.parse_batch(&contents) {
            Ok((parsed, record_failures)) => {
                candidates.extend(parsed);
                failures.extend(record_failures.into_iter().map(|f| ItemFailure {
                    item: format!("{name}: {}", f.item),
                    ..f
                }));
            }
            Err(e) => {
                warn!(file = %name, error = %e, "file skipped");
                failures.push(ItemFailure::new(name, &e));
            }
        }
    }
    info!(candidates = candidates.len(), failures = failures.len(), "records loaded");
    Ok((candidates, failures))
}

// Error types

#[derive(Debug)]
enum BreathCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoCandidates,
    ValidationFailed(usize),
}

impl From<io::Error> for BreathCliError {
    fn from(e: io::Error) -> Self {
        BreathCliError::Io(e)
    }
}

impl From<ComputeError> for BreathCliError {
    fn from(e: ComputeError) -> Self {
        BreathCliError::Compute(e)
    }
}

impl From<serde_json::Error> for BreathCliError {
    fn from(e: serde_json::Error) -> Self {
        BreathCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BreathCliError> for CliError {
    fn from(e: BreathCliError) -> Self {
        match e {
            BreathCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BreathCliError::Compute(e) => CliError {
                code: e.code().to_string(),
                message: e.to_string(),
                hint: Some("Check the records and configuration".to_string()),
            },
            BreathCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BreathCliError::NoCandidates => CliError {
                code: "NO_CANDIDATES".to_string(),
                message: "No loadable candidate records found".to_string(),
                hint: Some("Run 'breath-flux validate' for details".to_string()),
            },
            BreathCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed to load", count),
                hint: Some("Fix the listed records and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    candidates: usize,
    stages: usize,
    invalid_records: usize,
    errors: Vec<ItemFailure>,
}
