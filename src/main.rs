//! Synheart Activity CLI
//!
//! Runs the recognition pipeline over a live synthetic stream or a recording.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use synheart_activity::{
    collector::{
        read_recording, synthesize, write_recording, AccelUnits, ActivityProfile, Collector,
        CollectorConfig,
    },
    config::Config,
    core::{
        ActivityPipeline, Decision, FeatureExtractor, PipelineTask, PredictionSource,
        ReportBuilder, WindowScheduler,
    },
    inference::{SharedBackend, ThresholdLoader},
    transparency::{create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog},
    DATA_DECLARATION, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-activity")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "On-device human activity recognition from inertial sensors", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize activity from a live synthetic sensor stream
    Start {
        /// Activity the synthetic stream imitates (idle, walk, run)
        #[arg(long, default_value = "walk")]
        profile: String,

        /// Sample rate in Hz
        #[arg(long, default_value = "50")]
        rate: f64,

        /// Acceleration units reported by the stream (g or ms2)
        #[arg(long, default_value = "ms2")]
        units: String,

        /// Omit gyroscope readings
        #[arg(long)]
        no_gyro: bool,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Print each decision as a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Recognize activity from a JSON Lines recording
    Replay {
        /// Recording to replay
        input: PathBuf,

        /// Print each decision as a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Write a synthetic recording
    Record {
        /// Output file (defaults to the recordings directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Activity to imitate (idle, walk, run)
        #[arg(long, default_value = "walk")]
        profile: String,

        /// Length of the recording in seconds
        #[arg(long, default_value = "30")]
        duration: f64,

        /// Sample rate in Hz
        #[arg(long, default_value = "50")]
        rate: f64,

        /// Acceleration units (g or ms2)
        #[arg(long, default_value = "ms2")]
        units: String,
    },

    /// Print the feature vector of a recording's final window
    Features {
        /// Recording to analyze
        input: PathBuf,
    },

    /// Show counters from previous sessions
    Status,

    /// Display what data is processed and kept
    Privacy,

    /// Show configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Start {
            profile,
            rate,
            units,
            no_gyro,
            duration,
            json,
        } => {
            let collector_config = collector_config(&profile, rate, &units, !no_gyro)?;
            cmd_start(&config, collector_config, duration, json)
        }
        Commands::Replay { input, json } => cmd_replay(&config, &input, json),
        Commands::Record {
            output,
            profile,
            duration,
            rate,
            units,
        } => {
            let collector_config = collector_config(&profile, rate, &units, true)?;
            cmd_record(&config, collector_config, output, duration)
        }
        Commands::Features { input } => cmd_features(&config, &input),
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
        Commands::Config { init } => cmd_config(&config, cli.config.as_deref(), init),
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

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {path:?}"))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn collector_config(
    profile: &str,
    rate: f64,
    units: &str,
    include_gyro: bool,
) -> Result<CollectorConfig> {
    let profile = ActivityProfile::parse(profile)
        .ok_or_else(|| anyhow!("Unknown profile '{profile}' (expected idle, walk or run)"))?;
    let units = AccelUnits::parse(units)
        .ok_or_else(|| anyhow!("Unknown units '{units}' (expected g or ms2)"))?;
    if !(rate.is_finite() && rate > 0.0) {
        bail!("Sample rate must be positive, got {rate}");
    }
    Ok(CollectorConfig {
        profile,
        rate_hz: rate,
        units,
        include_gyro,
    })
}

/// Pipeline backed by the shared rule-based backend.
fn build_pipeline(config: &Config, stats: SharedTransparencyLog) -> ActivityPipeline {
    let loader = ThresholdLoader::new(config.classes.clone());
    let backend = Arc::new(SharedBackend::new(loader, config.backend_init_timeout));
    ActivityPipeline::new(config.pipeline_config(), backend).with_stats(stats)
}

fn print_decision(builder: &ReportBuilder, decision: &Decision, json: bool) {
    if json {
        match builder.build(decision).to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Warning: Could not serialize report: {e}"),
        }
        return;
    }

    let fallback = match decision.source {
        PredictionSource::Model => "",
        PredictionSource::Fallback => " [fallback]",
    };
    println!(
        "[{:>8.2}s] {:<8} confidence {:.2} (window {:.2}-{:.2}s, {} samples){}",
        decision.window_end,
        decision.label,
        decision.confidence,
        decision.window_start,
        decision.window_end,
        decision.sample_count,
        fallback
    );
}

fn cmd_start(
    config: &Config,
    collector_config: CollectorConfig,
    duration: Option<f64>,
    json: bool,
) -> Result<()> {
    if let Some(seconds) = duration {
        if !(seconds.is_finite() && seconds > 0.0) {
            bail!("Duration must be positive, got {seconds}");
        }
    }

    println!("Synheart Activity v{VERSION}");
    println!();

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting recognition...");
    println!("  Profile: {:?}", collector_config.profile);
    println!("  Sample rate: {} Hz", collector_config.rate_hz);
    println!("  Units: {:?}", collector_config.units);
    println!(
        "  Window: {}s, hop {}s, min {} samples",
        config.window_length, config.hop, config.min_samples
    );
    println!("  Classes: {}", config.classes.join(", "));
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let stats = create_shared_log_with_persistence(config.stats_path());
    let mut pipeline = build_pipeline(config, stats.clone());

    let builder = ReportBuilder::new().with_session_id(uuid::Uuid::new_v4().to_string());
    println!("Instance ID: {}", builder.instance_id());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut collector = Collector::new(collector_config);
    collector.start().context("Error starting collector")?;
    tracing::info!("Recognition session started");

    let receiver = collector.receiver().clone();
    let limit = duration.map(Duration::from_secs_f64);
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(sample) => {
                if let Some(decision) = runtime.block_on(pipeline.add_sample(sample)) {
                    print_decision(&builder, &decision, json);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Collector disconnected unexpectedly");
                break;
            }
        }
    }

    println!();
    println!("Stopping recognition...");
    collector.stop();
    pipeline.reset();
    tracing::info!("Recognition session stopped");

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save transparency stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_replay(config: &Config, input: &Path, json: bool) -> Result<()> {
    let samples =
        read_recording(input).with_context(|| format!("Failed to read recording {input:?}"))?;
    if samples.is_empty() {
        bail!("Recording {input:?} contains no samples");
    }

    let stats = create_shared_log_with_persistence(config.stats_path());
    let pipeline = build_pipeline(config, stats.clone());
    let builder = ReportBuilder::new().with_session_id(uuid::Uuid::new_v4().to_string());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let decisions = runtime.block_on(async move {
        let (task, mut decisions) = PipelineTask::spawn(pipeline, 1024);

        let printer = tokio::spawn(async move {
            let mut count = 0usize;
            while let Some(decision) = decisions.recv().await {
                print_decision(&builder, &decision, json);
                count += 1;
            }
            count
        });

        for sample in samples {
            task.send(sample)
                .await
                .map_err(|_| anyhow!("Pipeline task stopped unexpectedly"))?;
        }
        task.finish().await.context("Pipeline task failed")?;
        printer.await.context("Decision printer failed")
    })?;

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save transparency stats: {e}");
    }

    if !json {
        println!();
        println!("Replayed {input:?}: {decisions} decision(s)");
        println!("{}", stats.summary());
    }
    Ok(())
}

fn cmd_record(
    config: &Config,
    collector_config: CollectorConfig,
    output: Option<PathBuf>,
    duration: f64,
) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        bail!("Duration must be positive, got {duration}");
    }

    let path = output.unwrap_or_else(|| {
        let profile = format!("{:?}", collector_config.profile).to_lowercase();
        config.recordings_path().join(format!(
            "{profile}_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });

    let samples = synthesize(&collector_config, 0.0, duration);
    write_recording(&path, &samples)
        .with_context(|| format!("Failed to write recording {path:?}"))?;

    println!("Wrote {} samples ({duration}s) to {path:?}", samples.len());
    Ok(())
}

fn cmd_features(config: &Config, input: &Path) -> Result<()> {
    let samples =
        read_recording(input).with_context(|| format!("Failed to read recording {input:?}"))?;

    let mut scheduler = WindowScheduler::new(config.scheduler_config());
    for sample in samples {
        scheduler.append(sample);
    }
    let window = scheduler.snapshot().ok_or_else(|| {
        anyhow!(
            "Recording has fewer than {} samples in its final {}s window",
            config.min_samples,
            config.window_length
        )
    })?;

    let extractor = FeatureExtractor::new(config.feature_config(), config.feature_order.clone());
    let features = extractor.extract(window.samples());

    println!(
        "Window {:.2}-{:.2}s ({} samples)",
        window.start(),
        window.end(),
        window.len()
    );
    println!();
    for (name, value) in features.iter() {
        println!("  {name:<22} {value:>12.6}");
    }

    let non_finite = features.non_finite();
    if !non_finite.is_empty() {
        eprintln!();
        eprintln!("Warning: non-finite values for {}", non_finite.join(", "));
    }
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("Synheart Activity Status");
    println!("========================");
    println!();

    let path = config.stats_path();
    if !path.exists() {
        println!("No previous session data found.");
        return;
    }

    let stats = TransparencyLog::with_persistence(path).stats();
    println!("Previous sessions:");
    println!("  Samples processed: {}", stats.samples_processed);
    println!("  Out-of-order samples dropped: {}", stats.out_of_order_dropped);
    println!("  Windows extracted: {}", stats.windows_extracted);
    println!("  Inferences completed: {}", stats.inferences_completed);
    println!("  Fallback decisions: {}", stats.fallback_decisions);
    println!("  Non-finite feature values: {}", stats.non_finite_features);
    println!("  UNKNOWN decisions: {}", stats.unknown_decisions);
}

fn cmd_privacy() {
    println!("{DATA_DECLARATION}");
}

fn cmd_config(config: &Config, explicit_path: Option<&Path>, init: bool) -> Result<()> {
    let path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if init {
        Config::default()
            .save_to(&path)
            .with_context(|| format!("Failed to write configuration to {path:?}"))?;
        println!("Wrote default configuration to {path:?}");
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
