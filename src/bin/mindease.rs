//! MindEase CLI - Command-line interface for the MindEase stress engine
//!
//! Commands:
//! - score: Score one set of readings
//! - classify: Map a score to its stress level
//! - replay: Feed recorded samples through a live monitor and print alerts
//! - config: Print the default monitor configuration
//! - breathe: Run a guided breathing session in the terminal

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use mindease::breathing::{run_session, BreathingSession, DEFAULT_TOTAL_CYCLES};
use mindease::scorer::StressFactors;
use mindease::source::SortOrder;
use mindease::{
    AlertPreferences, AlertRecord, BiometricSample, DataSource, InMemoryDataSource, LogSink,
    MonitorConfig, MonitorError, MonitorState, Profile, StressMonitor, UserId, MINDEASE_VERSION,
};
use tracing_subscriber::EnvFilter;

/// MindEase - stress scoring and alerting for wearable biometrics
#[derive(Parser)]
#[command(name = "mindease")]
#[command(author = "MindEase")]
#[command(version = MINDEASE_VERSION)]
#[command(about = "Score biometric readings and replay them through the alert monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one set of readings
    Score {
        /// Galvanic skin response
        #[arg(long, default_value = "0")]
        gsr: f64,

        /// Heart rate (bpm)
        #[arg(long, default_value = "0")]
        heartbeat: f64,

        /// Blood oxygen saturation (%)
        #[arg(long, default_value = "100")]
        spo2: f64,

        /// Body temperature (celsius)
        #[arg(long, default_value = "0")]
        temperature: f64,

        /// Monitor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Map a score to its stress level
    Classify {
        /// Stress score
        score: f64,

        /// Monitor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Feed recorded samples (NDJSON) through a monitor and print the alerts it raises
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// User the samples belong to (used when a record has no user_id)
        #[arg(long, default_value = "local-user")]
        user_id: String,

        /// Own phone number for alert messages
        #[arg(long)]
        phone: Option<String>,

        /// Doctor phone number
        #[arg(long)]
        doctor_phone: Option<String>,

        /// Emergency contact number (critical alerts only)
        #[arg(long)]
        emergency_contact: Option<String>,

        /// Enable automatic alerts for this user
        #[arg(long)]
        alert_enabled: bool,

        /// Also message the doctor
        #[arg(long)]
        doctor_alert_enabled: bool,

        /// Monitor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default monitor configuration
    Config {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a guided breathing session
    Breathe {
        /// Number of cycles
        #[arg(long, default_value_t = DEFAULT_TOTAL_CYCLES)]
        cycles: u32,

        /// Seconds per phase
        #[arg(long, default_value = "4")]
        phase_secs: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), MindeaseCliError> {
    match cli.command {
        Commands::Score {
            gsr,
            heartbeat,
            spo2,
            temperature,
            config,
            json,
        } => cmd_score(gsr, heartbeat, spo2, temperature, config.as_deref(), json),

        Commands::Classify { score, config } => cmd_classify(score, config.as_deref()),

        Commands::Replay {
            input,
            user_id,
            phone,
            doctor_phone,
            emergency_contact,
            alert_enabled,
            doctor_alert_enabled,
            config,
        } => {
            let prefs = AlertPreferences {
                alert_enabled,
                doctor_alert_enabled,
                phone,
                doctor_phone,
                emergency_contact,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(cmd_replay(&input, UserId::new(user_id), prefs, config.as_deref()))
        }

        Commands::Config { output } => cmd_config(output.as_deref()),

        Commands::Breathe { cycles, phase_secs } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(cmd_breathe(cycles, phase_secs))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, MindeaseCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn cmd_score(
    gsr: f64,
    heartbeat: f64,
    spo2: f64,
    temperature: f64,
    config: Option<&Path>,
    json: bool,
) -> Result<(), MindeaseCliError> {
    let config = load_config(config)?;
    let factors = StressFactors::from_readings(gsr, heartbeat, spo2, temperature);
    let score = factors.score();
    let level = config.thresholds.classify(score);
    let state = MonitorState {
        score,
        level,
        blinking: false,
    };

    if json {
        let report = ScoreReport {
            score,
            percent: state.percent(),
            level: level.as_str(),
            factors,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress: {}% {} {}", state.percent(), level.indicator(), level.label());
        println!("  gsr         {:.3}", factors.gsr);
        println!("  heart rate  {:.3}", factors.heart_rate);
        println!("  temperature {:.3}", factors.temperature);
        println!("  spo2        {:.3}", factors.spo2);
    }
    Ok(())
}

fn cmd_classify(score: f64, config: Option<&Path>) -> Result<(), MindeaseCliError> {
    if score.is_nan() {
        return Err(MindeaseCliError::ParseError("score must be a number".to_string()));
    }
    let config = load_config(config)?;
    println!("{}", config.thresholds.classify(score).as_str());
    Ok(())
}

async fn cmd_replay(
    input: &Path,
    user_id: UserId,
    prefs: AlertPreferences,
    config: Option<&Path>,
) -> Result<(), MindeaseCliError> {
    let config = load_config(config)?;
    let samples = read_samples(input, &user_id)?;
    let total = samples.len();

    let (alerts, final_state) = replay(samples, user_id, prefs, config).await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for alert in &alerts {
        writeln!(out, "{}", serde_json::to_string(alert)?)?;
    }
    out.flush()?;

    eprintln!(
        "Replayed {} samples: {} alerts, last level {}",
        total,
        alerts.len(),
        final_state.level.label()
    );
    Ok(())
}

/// Run samples through a live monitor backed by memory.
///
/// Alerts are read back from the store once the monitor has drained every
/// insert, so none are lost however far the output lags.
async fn replay(
    samples: Vec<BiometricSample>,
    user_id: UserId,
    prefs: AlertPreferences,
    config: MonitorConfig,
) -> Result<(Vec<AlertRecord>, MonitorState), MindeaseCliError> {
    if samples.is_empty() {
        return Err(MindeaseCliError::NoSamples);
    }

    let source = Arc::new(InMemoryDataSource::new());
    let mut profile = Profile::new(user_id.clone());
    profile.alerts = prefs;
    source.upsert_profile(profile).await?;

    let monitor = StressMonitor::new(user_id.clone(), config, source.clone(), Arc::new(LogSink))?;
    let handle = mindease::spawn(monitor).await?;
    let state = handle.state();

    for sample in samples {
        source.insert_sample(sample).await?;
    }
    handle.shutdown().await?;

    let final_state = *state.borrow();
    let alerts = source
        .query_alerts(&user_id, SortOrder::Ascending, usize::MAX)
        .await?;
    Ok((alerts, final_state))
}

/// Parse NDJSON sample records, filling in the user id where missing
fn read_samples(input: &Path, user_id: &UserId) -> Result<Vec<BiometricSample>, MindeaseCliError> {
    let data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("Reading samples from the terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut samples = Vec::new();
    for (index, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            MindeaseCliError::ParseError(format!("line {}: {}", index + 1, e))
        })?;
        if let Some(record) = value.as_object_mut() {
            record
                .entry("user_id")
                .or_insert_with(|| serde_json::Value::String(user_id.to_string()));
        }
        let sample: BiometricSample = serde_json::from_value(value).map_err(|e| {
            MindeaseCliError::ParseError(format!("line {}: {}", index + 1, e))
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

fn cmd_config(output: Option<&Path>) -> Result<(), MindeaseCliError> {
    let json = MonitorConfig::default().to_json()?;
    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

async fn cmd_breathe(cycles: u32, phase_secs: u64) -> Result<(), MindeaseCliError> {
    if cycles == 0 || phase_secs == 0 {
        return Err(MindeaseCliError::ParseError(
            "cycles and phase-secs must be greater than zero".to_string(),
        ));
    }

    let mut session = BreathingSession::new(cycles).with_phase_duration(Duration::from_secs(phase_secs));
    let completed = run_session(&mut session, |phase, done| {
        println!("[{}/{}] {}", done + 1, cycles, phase.label());
    })
    .await;

    println!("Done: {} cycles", completed);
    Ok(())
}

#[derive(serde::Serialize)]
struct ScoreReport {
    score: f64,
    percent: i64,
    level: &'static str,
    factors: StressFactors,
}

// Error handling

#[derive(Debug)]
enum MindeaseCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    NoSamples,
    ParseError(String),
}

impl From<io::Error> for MindeaseCliError {
    fn from(e: io::Error) -> Self {
        MindeaseCliError::Io(e)
    }
}

impl From<MonitorError> for MindeaseCliError {
    fn from(e: MonitorError) -> Self {
        MindeaseCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for MindeaseCliError {
    fn from(e: serde_json::Error) -> Self {
        MindeaseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MindeaseCliError> for CliError {
    fn from(e: MindeaseCliError) -> Self {
        match e {
            MindeaseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MindeaseCliError::Monitor(e @ MonitorError::InvalidConfig(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'mindease config' for a valid starting point".to_string()),
            },
            MindeaseCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            MindeaseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MindeaseCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input has one sample record per line".to_string()),
            },
            MindeaseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line needs at least recorded_at and the available readings".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use mindease::{AlertType, StressLevel};
    use pretty_assertions::assert_eq;

    fn critical_samples(user: &UserId, count: usize) -> Vec<BiometricSample> {
        let start = Utc::now();
        (0..count)
            .map(|i| {
                BiometricSample::new(
                    user.clone(),
                    1500.0,
                    72,
                    98.0,
                    36.5,
                    start + ChronoDuration::milliseconds(i as i64),
                )
                .with_stress_score(0.95)
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replay_reports_every_alert_beyond_event_capacity() {
        let user = UserId::new("replay-user");
        let config = MonitorConfig::default();
        let count = config.event_capacity * 4;
        let prefs = AlertPreferences {
            alert_enabled: true,
            phone: Some("+1555".to_string()),
            ..Default::default()
        };

        let (alerts, state) = replay(critical_samples(&user, count), user, prefs, config)
            .await
            .unwrap();

        assert_eq!(alerts.len(), count);
        assert!(alerts.iter().all(|a| a.alert_type == AlertType::Automatic));
        assert_eq!(state.level, StressLevel::Critical);
    }

    #[tokio::test]
    async fn test_replay_rejects_empty_input() {
        let result = replay(
            Vec::new(),
            UserId::new("u1"),
            AlertPreferences::default(),
            MonitorConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(MindeaseCliError::NoSamples)));
    }

    #[test]
    fn test_read_samples_fills_missing_user_id() {
        let path = std::env::temp_dir().join(format!("mindease-replay-{}.ndjson", std::process::id()));
        fs::write(
            &path,
            "{\"stress_score\": 0.95, \"recorded_at\": \"2024-01-15T10:00:00Z\"}\n\n",
        )
        .unwrap();

        let samples = read_samples(&path, &UserId::new("u9")).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].user_id, UserId::new("u9"));
        assert_eq!(samples[0].stress_score, Some(0.95));
    }
}
