//! Liveness CLI - Command-line interface for the attendance liveness engine
//!
//! Commands:
//! - replay: Drive a session from recorded detector output (NDJSON frame records)
//! - features: Print the geometric signals of a single landmark set
//! - config: Print the default configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use attendance_liveness::selector::ChallengeSelector;
use attendance_liveness::{
    FaceFeatures, FrameRecord, LandmarkSet, LivenessConfig, LivenessError, ManualClock,
    SessionController, LIVENESS_VERSION,
};

/// Liveness - Challenge-response liveness checks from facial landmarks
#[derive(Parser)]
#[command(name = "liveness")]
#[command(version = LIVENESS_VERSION)]
#[command(about = "Verify liveness challenges from recorded landmark frames", long_about = None)]
struct Cli {
    /// Log session transitions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded frames through a session on the recording's timeline
    Replay {
        /// Input file path, one frame record per line (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON); defaults are used for missing fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the challenge order
        #[arg(long)]
        seed: Option<u64>,

        /// Milliseconds between records that carry no t_ms
        #[arg(long, default_value = "33")]
        frame_interval_ms: i64,

        /// Print a step report for every record
        #[arg(long)]
        trace: bool,
    },

    /// Print eye, yaw and mouth signals for one landmark set
    Features {
        /// Input file path, a JSON array of landmarks (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration
    Config {
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), LivenessCliError> {
    match cli.command {
        Commands::Replay {
            input,
            config,
            seed,
            frame_interval_ms,
            trace,
        } => cmd_replay(&input, config.as_deref(), seed, frame_interval_ms, trace),

        Commands::Features { input, config } => cmd_features(&input, config.as_deref()),

        Commands::Config { output } => cmd_config(output.as_deref()),
    }
}

fn cmd_replay(
    input: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    frame_interval_ms: i64,
    trace: bool,
) -> Result<(), LivenessCliError> {
    let config = load_config(config_path)?;
    let selector = match seed {
        Some(seed) => ChallengeSelector::with_seed(config.required_actions, seed),
        None => ChallengeSelector::new(config.required_actions),
    };

    let clock = ManualClock::at_epoch();
    let mut controller = SessionController::with_parts(config, Arc::new(clock.clone()), selector)?;
    controller.on_complete(|event| {
        info!(status = event.status.as_str(), elapsed_ms = event.elapsed_ms, "replay finished");
    });

    let reader = open_input(input)?;
    let mut stdout = io::stdout();
    let mut timeline_ms: Option<i64> = None;
    let mut records = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(trimmed).map_err(|e| {
            LivenessCliError::ParseError(format!(
                "Failed to parse record on line {}: {}",
                index + 1,
                e
            ))
        })?;

        let t_ms = match (record.t_ms, timeline_ms) {
            (Some(t), _) => t,
            (None, Some(previous)) => previous.saturating_add(frame_interval_ms),
            (None, None) => 0,
        };
        if let Some(previous) = timeline_ms {
            if t_ms < previous {
                return Err(LivenessCliError::ParseError(format!(
                    "t_ms went backwards on line {}: {} < {}",
                    index + 1,
                    t_ms,
                    previous
                )));
            }
        }
        timeline_ms = Some(t_ms);
        clock.set_epoch_ms(t_ms);

        if !controller.is_started() {
            controller.start();
        }

        let outcome = controller.on_record(&record)?;
        records += 1;
        debug!(line = index + 1, t_ms, ?outcome, "record applied");

        if trace {
            writeln!(stdout, "{}", serde_json::to_string(&controller.report(outcome))?)?;
        }

        if controller.is_terminal() {
            break;
        }
    }

    if records == 0 {
        return Err(LivenessCliError::NoRecords);
    }

    let summary = match controller.outcome() {
        Some(event) => to_json(event)?,
        None => to_json(&controller.snapshot())?,
    };
    writeln!(stdout, "{}", summary)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_features(input: &Path, config_path: Option<&Path>) -> Result<(), LivenessCliError> {
    let config = load_config(config_path)?;

    let mut data = String::new();
    open_input(input)?.read_to_string(&mut data)?;
    let landmarks: LandmarkSet = serde_json::from_str(&data)?;

    let required = config.layout.required_len();
    if landmarks.len() < required {
        return Err(LivenessError::MalformedLandmarks {
            required,
            actual: landmarks.len(),
        }
        .into());
    }

    let features = FaceFeatures::extract(&landmarks, &config);
    println!("{}", to_json(&features)?);
    Ok(())
}

fn cmd_config(output: Option<&Path>) -> Result<(), LivenessCliError> {
    let json = LivenessConfig::default().to_json()?;

    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LivenessConfig, LivenessCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(LivenessConfig::from_json(&json)?)
        }
        None => Ok(LivenessConfig::default()),
    }
}

fn open_input(input: &Path) -> Result<Box<dyn BufRead>, LivenessCliError> {
    if input.to_string_lossy() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(fs::File::open(input)?)))
    }
}

/// Pretty when a human is watching, compact when piped
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, LivenessCliError> {
    if atty::is(atty::Stream::Stdout) {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

// Error types

#[derive(Debug)]
enum LivenessCliError {
    Io(io::Error),
    Engine(LivenessError),
    Json(serde_json::Error),
    NoRecords,
    ParseError(String),
}

impl From<io::Error> for LivenessCliError {
    fn from(e: io::Error) -> Self {
        LivenessCliError::Io(e)
    }
}

impl From<LivenessError> for LivenessCliError {
    fn from(e: LivenessError) -> Self {
        LivenessCliError::Engine(e)
    }
}

impl From<serde_json::Error> for LivenessCliError {
    fn from(e: serde_json::Error) -> Self {
        LivenessCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LivenessCliError> for CliError {
    fn from(e: LivenessCliError) -> Self {
        match e {
            LivenessCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LivenessCliError::Engine(e) => {
                let (code, hint) = match e {
                    LivenessError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'liveness config' for a valid starting point")
                    }
                    LivenessError::MalformedLandmarks { .. } => (
                        "MALFORMED_LANDMARKS",
                        "Landmark sets must cover every index in the layout",
                    ),
                    LivenessError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    _ => ("ENGINE_ERROR", "Re-run with --verbose for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LivenessCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LivenessCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No frame records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LivenessCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each line must be a frame record: {\"t_ms\": .., \"faces\": [..]}"
                        .to_string(),
                ),
            },
        }
    }
}
