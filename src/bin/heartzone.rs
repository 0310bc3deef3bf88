//! Heartzone CLI - Command-line interface for the heart rate zone pipeline
//!
//! Commands:
//! - replay: Push recorded samples through a monitoring session (batch mode)
//! - run: Monitor samples streamed on stdin (streaming mode)
//! - validate: Check a sample file for suspicious readings
//! - classify: Classify a single reading
//! - zones: Print the zone table
//! - doctor: Diagnose configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use heartzone::config::MonitorConfig;
use heartzone::controller::MonitoringController;
use heartzone::feedback::{RecordingHaptics, TracingHaptics};
use heartzone::presentation::{appearance, appearances, bpm_range, format_bpm, StatsSummary};
use heartzone::service;
use heartzone::source::{parse_array, parse_ndjson, validate_samples, ChannelSource, SampleIssue};
use heartzone::types::{FeedbackEffect, MonitoringState, Sample};
use heartzone::zone::{classify, percentage_of_max, Zone};
use heartzone::{MonitorError, HEARTZONE_VERSION, PRODUCER_NAME};

/// Heartzone - live heart rate zone tracking
#[derive(Parser)]
#[command(name = "heartzone")]
#[command(version = HEARTZONE_VERSION)]
#[command(about = "Classify heart rate samples into training zones", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Age used for max heart rate (220 - age); overrides the config
    #[arg(long, global = true)]
    age: Option<u32>,

    /// Max heart rate in bpm; overrides the config
    #[arg(long, global = true)]
    max_heart_rate: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push recorded samples through a monitoring session
    Replay {
        /// Input file path (use - for stdin), oldest sample first
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Samples delivered per batch
        #[arg(long, default_value = "1")]
        batch_size: usize,
    },

    /// Monitor NDJSON samples streamed on stdin, printing state after each one
    Run {
        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Check a sample file for suspicious readings
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a single reading
    Classify {
        /// Heart rate in bpm
        bpm: f64,
    },

    /// Print the zone table
    Zones {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HeartzoneCliError> {
    let config = load_config(cli.config.as_deref(), cli.age, cli.max_heart_rate)?;
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            batch_size,
        } => cmd_replay(&config, &input, &output, input_format, output_format, batch_size),

        Commands::Run { no_flush } => cmd_run(&config, !no_flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Classify { bpm } => cmd_classify(&config, bpm),

        Commands::Zones { json } => cmd_zones(&config, json),

        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

/// Config file, then flags on top
fn load_config(
    path: Option<&Path>,
    age: Option<u32>,
    max_heart_rate: Option<f64>,
) -> Result<MonitorConfig, HeartzoneCliError> {
    let mut config = match path {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(max_heart_rate) = max_heart_rate {
        config.max_heart_rate = max_heart_rate;
        config.age = None;
    }
    if age.is_some() {
        config.age = age;
    }

    config.validate()?;
    Ok(config)
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn runtime() -> Result<tokio::runtime::Runtime, HeartzoneCliError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn read_input(input: &Path) -> Result<String, HeartzoneCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_samples(input_data: &str, input_format: InputFormat) -> Result<Vec<Sample>, HeartzoneCliError> {
    let samples = match input_format {
        InputFormat::Ndjson => parse_ndjson(input_data)?,
        InputFormat::Json => parse_array(input_data)?,
    };
    Ok(samples)
}

fn cmd_replay(
    config: &MonitorConfig,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    batch_size: usize,
) -> Result<(), HeartzoneCliError> {
    let samples = parse_samples(&read_input(input)?, input_format)?;
    if samples.is_empty() {
        return Err(HeartzoneCliError::NoSamples);
    }

    let haptics = Arc::new(RecordingHaptics::new());
    let (feeder, source) = ChannelSource::create();
    let mut controller = MonitoringController::new(Arc::new(source), haptics.clone(), config)?;

    let report = runtime()?.block_on(async move {
        controller.request_authorization().await;
        controller.start();

        // Input is oldest first; each batch is delivered newest first
        for chunk in samples.chunks(batch_size.max(1)) {
            let mut batch = chunk.to_vec();
            batch.reverse();
            feeder.push(batch);
            controller.drain_pending();
        }

        controller.stop();
        let state = controller.state();
        info!(samples = state.stats.count, "replay finished");

        ReplayReport {
            summary: StatsSummary::from(&state.stats),
            effects: haptics.effects(),
            state,
        }
    });

    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: &MonitorConfig, flush: bool) -> Result<(), HeartzoneCliError> {
    let (feeder, source) = ChannelSource::create();
    let controller =
        MonitoringController::new(Arc::new(source), Arc::new(TracingHaptics), config)?;

    runtime()?.block_on(async move {
        let (handle, task) = service::spawn(controller);
        let mut state = handle.watch();

        handle.request_authorization();
        handle.start();
        state
            .wait_for(|s| s.is_monitoring || s.last_error.is_some())
            .await
            .map_err(|_| HeartzoneCliError::ControllerStopped)?;

        // stdin is read on a blocking thread and handed over one sample at a time
        let (samples_tx, mut samples_rx) = mpsc::unbounded_channel();
        let reader = tokio::task::spawn_blocking(move || read_stdin_samples(samples_tx));

        let mut stdout = io::stdout();
        let mut delivered = 0usize;
        while let Some(sample) = samples_rx.recv().await {
            if !feeder.push(vec![sample]) {
                break;
            }
            delivered += 1;
            let current: MonitoringState = state
                .wait_for(|s| s.stats.count >= delivered)
                .await
                .map_err(|_| HeartzoneCliError::ControllerStopped)?
                .clone();
            writeln!(stdout, "{}", serde_json::to_string(&current)?)?;
            if flush {
                stdout.flush()?;
            }
        }

        let read_result = reader
            .await
            .map_err(|e| HeartzoneCliError::ParseError(e.to_string()))?;

        handle.shutdown();
        let controller = task
            .await
            .map_err(|_| HeartzoneCliError::ControllerStopped)?;
        debug!(samples = controller.session().len(), "stream closed");

        read_result
    })
}

fn read_stdin_samples(samples: mpsc::UnboundedSender<Sample>) -> Result<(), HeartzoneCliError> {
    let stdin = io::stdin();
    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let sample: Sample = serde_json::from_str(trimmed).map_err(|e| {
            HeartzoneCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        if samples.send(sample).is_err() {
            break;
        }
    }
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), HeartzoneCliError> {
    let samples = parse_samples(&read_input(input)?, input_format)?;
    let issues = validate_samples(&samples);

    let report = ValidationReport {
        total_samples: samples.len(),
        flagged_samples: issues
            .iter()
            .map(|i| i.index)
            .collect::<std::collections::BTreeSet<_>>()
            .len(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total samples:   {}", report.total_samples);
        println!("Flagged samples: {}", report.flagged_samples);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!("  - Sample {}: {}", issue.index, issue.message);
            }
        }
    }

    if report.flagged_samples > 0 {
        Err(HeartzoneCliError::ValidationFailed(report.flagged_samples))
    } else {
        Ok(())
    }
}

fn cmd_classify(config: &MonitorConfig, bpm: f64) -> Result<(), HeartzoneCliError> {
    let max_heart_rate = config.resolved_max_heart_rate()?;
    let zone = classify(bpm, max_heart_rate)?;

    let report = ClassifyReport {
        bpm,
        max_heart_rate,
        percentage: percentage_of_max(bpm, max_heart_rate)?,
        zone,
        label: appearance(zone).label,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_zones(config: &MonitorConfig, json: bool) -> Result<(), HeartzoneCliError> {
    let max_heart_rate = config.resolved_max_heart_rate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(appearances())?);
        return Ok(());
    }

    println!("Zones for max heart rate {} bpm", format_bpm(max_heart_rate));
    println!();
    for item in appearances() {
        println!(
            "  {:<9} {:<8} {:<12} {} ({})",
            item.label,
            item.range,
            format!("{} bpm", bpm_range(item.zone, max_heart_rate)),
            item.description,
            item.color.hex()
        );
    }
    Ok(())
}

fn cmd_doctor(
    config: &MonitorConfig,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), HeartzoneCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Heartzone version {}", HEARTZONE_VERSION),
    });

    checks.push(match config_path {
        Some(path) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", path.display()),
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "No config file, using defaults".to_string(),
        },
    });

    checks.push(match config.resolved_max_heart_rate() {
        Ok(max_heart_rate) => DoctorCheck {
            name: "max_heart_rate".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{} bpm, Peak starts at {} bpm",
                format_bpm(max_heart_rate),
                format_bpm(Zone::Peak.lower_bound_pct() / 100.0 * max_heart_rate)
            ),
        },
        Err(e) => DoctorCheck {
            name: "max_heart_rate".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: HEARTZONE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Heartzone Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(HeartzoneCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum HeartzoneCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    NoSamples,
    ValidationFailed(usize),
    DoctorFailed,
    ControllerStopped,
    ParseError(String),
}

impl From<io::Error> for HeartzoneCliError {
    fn from(e: io::Error) -> Self {
        HeartzoneCliError::Io(e)
    }
}

impl From<MonitorError> for HeartzoneCliError {
    fn from(e: MonitorError) -> Self {
        HeartzoneCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for HeartzoneCliError {
    fn from(e: serde_json::Error) -> Self {
        HeartzoneCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HeartzoneCliError> for CliError {
    fn from(e: HeartzoneCliError) -> Self {
        match e {
            HeartzoneCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HeartzoneCliError::Monitor(e @ MonitorError::InvalidParameter(_)) => CliError {
                code: "INVALID_PARAMETER".to_string(),
                message: e.to_string(),
                hint: Some("Check --age, --max-heart-rate and the config file".to_string()),
            },
            HeartzoneCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure each sample has numeric bpm and an RFC 3339 timestamp".to_string()),
            },
            HeartzoneCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HeartzoneCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            HeartzoneCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} samples flagged", count),
                hint: Some("Flagged samples are still accepted by the pipeline".to_string()),
            },
            HeartzoneCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            HeartzoneCliError::ControllerStopped => CliError {
                code: "CONTROLLER_STOPPED".to_string(),
                message: "Monitoring controller exited unexpectedly".to_string(),
                hint: None,
            },
            HeartzoneCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ReplayReport {
    state: MonitoringState,
    summary: StatsSummary,
    effects: Vec<FeedbackEffect>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_samples: usize,
    flagged_samples: usize,
    issues: Vec<SampleIssue>,
}

#[derive(serde::Serialize)]
struct ClassifyReport {
    bpm: f64,
    max_heart_rate: f64,
    percentage: f64,
    zone: Zone,
    label: &'static str,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
