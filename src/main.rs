//! Posture Agent CLI
//!
//! Sitting-posture classification with adaptive frame sampling.

use chrono::Utc;
use clap::{Parser, Subcommand};
use posture_agent::{
    config::Config,
    core::{Advisory, PostureSnapshot, SnapshotBuilder, Thresholds},
    health::health_conditions_text,
    pose::{Recording, SyntheticScript},
    runner::{run_tick_loop, LoopExit, REPORT_CHANNEL_CAPACITY},
    session::{PostureSession, SessionCommand, SessionExport, SessionSummary},
    stats::create_shared_log_with_persistence,
    FrameReport, PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;

#[cfg(feature = "remote-config")]
use posture_agent::BlockingThresholdClient;

#[cfg(feature = "server")]
use posture_agent::server::{self, ServerConfig, ServerState};

/// How often a running agent re-reads the config file.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "posture-agent")]
#[command(version = VERSION)]
#[command(about = "Sitting-posture classification with adaptive frame sampling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start analyzing posture
    Start {
        /// Replay a landmark recording (JSON Lines) instead of the synthetic subject
        #[arg(long)]
        recording: Option<PathBuf>,

        /// Pace the recording using its timestamps
        #[arg(long)]
        realtime: bool,

        /// Base URL serving /api/posture_thresholds (requires remote-config feature)
        #[arg(long)]
        thresholds_url: Option<String>,

        /// Serve status endpoints on this port (requires server feature)
        #[arg(long)]
        serve: Option<u16>,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Artificial detection delay for the synthetic subject, in milliseconds
        #[arg(long, default_value = "0")]
        detect_delay_ms: u64,
    },

    /// Pause analysis
    Pause,

    /// Resume analysis
    Resume,

    /// Show current status
    Status,

    /// Show the effective posture thresholds
    Thresholds {
        /// Fetch from this base URL instead of the configured one
        #[arg(long)]
        url: Option<String>,
    },

    /// Show posture-related health information
    Health,

    /// Display privacy declaration
    Privacy,

    /// Export posture snapshots from previous sessions
    Export {
        /// Output directory for snapshots
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,
}

struct StartOptions {
    recording: Option<PathBuf>,
    realtime: bool,
    thresholds_url: Option<String>,
    serve: Option<u16>,
    frames: Option<u64>,
    detect_delay_ms: u64,
}

enum Input {
    Replay(Recording),
    Synthetic(SyntheticScript),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            recording,
            realtime,
            thresholds_url,
            serve,
            frames,
            detect_delay_ms,
        } => {
            cmd_start(StartOptions {
                recording,
                realtime,
                thresholds_url,
                serve,
                frames,
                detect_delay_ms,
            });
        }
        Commands::Pause => {
            cmd_pause();
        }
        Commands::Resume => {
            cmd_resume();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Thresholds { url } => {
            cmd_thresholds(url);
        }
        Commands::Health => {
            cmd_health();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("posture_agent=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_start(opts: StartOptions) {
    println!("Posture Agent v{VERSION}");
    println!();

    // Load or create configuration
    let config = Config::load_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let input = match &opts.recording {
        Some(path) => match Recording::load(path) {
            Ok(mut recording) => {
                if let Some(limit) = opts.frames {
                    recording.frames.truncate(limit as usize);
                }
                println!("Input: recording {:?} ({} frames)", path, recording.len());
                Input::Replay(recording)
            }
            Err(e) => {
                eprintln!("Error: Could not load recording {path:?}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("Input: synthetic subject");
            Input::Synthetic(SyntheticScript {
                total_frames: opts.frames,
                detect_delay: Duration::from_millis(opts.detect_delay_ms),
                ..SyntheticScript::default()
            })
        }
    };

    let thresholds_url = opts
        .thresholds_url
        .clone()
        .or_else(|| config.thresholds_url.clone());
    let thresholds = load_remote_thresholds(thresholds_url.as_deref(), config.effective_thresholds());

    println!(
        "  Thresholds: neck < {}°, torso < {}°, alignment < {}px, forward head <= {}",
        thresholds.neck_angle_deg,
        thresholds.torso_angle_deg,
        thresholds.alignment_px,
        thresholds.forward_head_ratio
    );
    println!("  Chart time zone: {}", config.tz());

    #[cfg(not(feature = "server"))]
    if opts.serve.is_some() {
        eprintln!("Warning: --serve flag ignored (server feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Session statistics
    let log = create_shared_log_with_persistence(config.stats_path());

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let (commands_tx, mut commands_rx) = tokio::sync::mpsc::unbounded_channel();
    let (thresholds_tx, _thresholds_rx) = watch::channel(thresholds);

    if config.paused {
        let _ = commands_tx.send(SessionCommand::Pause);
        println!("Analysis is currently paused.");
        println!("Run `posture-agent resume` to start analyzing.");
        println!();
    }

    let mut session = PostureSession::new(thresholds, config.tz(), log.clone());
    let (sink, reports) = crossbeam_channel::bounded::<FrameReport>(REPORT_CHANNEL_CAPACITY);

    #[cfg(feature = "server")]
    let server_state = opts
        .serve
        .map(|_| ServerState::new(thresholds_tx.subscribe(), log.clone(), commands_tx.clone()));

    // Snapshot builder
    let session_id = format!("SESS-{}", Utc::now().timestamp_millis());
    let snapshot_builder = SnapshotBuilder::new().with_session_id(session_id);
    println!("Instance ID: {}", snapshot_builder.instance_id());

    // Report consumer: console output, snapshots and the status server
    #[cfg(feature = "server")]
    let consumer_state = server_state.clone();
    let consumer = thread::spawn(move || {
        let mut snapshots: Vec<PostureSnapshot> = Vec::new();
        let mut last_advisory = Advisory::None;

        for report in reports.iter() {
            if report.chart_reset {
                println!("Session reset");
            }
            if report.chart.is_some() || report.advisory != last_advisory {
                println!("{}", report.summary_line());
            }
            last_advisory = report.advisory;

            if report.chart.is_some() {
                if let Some(snapshot) = snapshot_builder.build(&report) {
                    snapshots.push(snapshot);
                }
            }

            #[cfg(feature = "server")]
            if let Some(ref state) = consumer_state {
                state.blocking_publish_report(report);
            }
        }

        snapshots
    });

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Could not create runtime: {e}");
            std::process::exit(1);
        }
    };

    let (exit, summary) = runtime.block_on(async {
        #[cfg(feature = "server")]
        let server_shutdown = match (opts.serve, server_state) {
            (Some(port), Some(state)) => match server::run(ServerConfig::new(port), state).await {
                Ok((addr, shutdown)) => {
                    println!("Status server: http://{addr}");
                    Some(shutdown)
                }
                Err(e) => {
                    eprintln!("Warning: Could not start status server: {e}");
                    None
                }
            },
            _ => None,
        };

        // Support pause/resume and threshold edits from another process by
        // polling the config file.
        let poller = tokio::spawn(poll_config(
            config.clone(),
            commands_tx.clone(),
            thresholds_tx,
        ));

        let exit = match input {
            Input::Replay(recording) => {
                let (mut source, mut detector) = recording.into_replay(opts.realtime);
                run_tick_loop(
                    &mut source,
                    &mut detector,
                    &mut session,
                    &mut commands_rx,
                    &sink,
                    &running,
                )
                .await
            }
            Input::Synthetic(script) => {
                let (mut source, mut detector) = script.build();
                run_tick_loop(
                    &mut source,
                    &mut detector,
                    &mut session,
                    &mut commands_rx,
                    &sink,
                    &running,
                )
                .await
            }
        };

        poller.abort();

        #[cfg(feature = "server")]
        if let Some(shutdown) = server_shutdown {
            let _ = shutdown.send(());
        }

        (exit, session.summary())
    });

    // Closing the channel ends the consumer
    drop(sink);
    let snapshots = consumer.join().unwrap_or_else(|_| {
        eprintln!("Warning: Report consumer stopped unexpectedly");
        Vec::new()
    });

    println!();
    match exit {
        LoopExit::Stopped => println!("Stopping analysis..."),
        LoopExit::SourceEnded => println!("Input finished."),
    }

    // Save session statistics
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save session statistics: {e}");
    }

    // Export snapshots
    if !snapshots.is_empty() {
        let export_path = config.export_path.join(format!(
            "session_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));

        if let Some(parent) = export_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let export = SessionExport {
            summary: summary.clone(),
            snapshots,
        };
        match serde_json::to_string_pretty(&export) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&export_path, json) {
                    eprintln!("Error writing snapshots: {e}");
                } else {
                    println!(
                        "Exported {} snapshots to {:?}",
                        export.snapshots.len(),
                        export_path
                    );
                }
            }
            Err(e) => {
                eprintln!("Error serializing snapshots: {e}");
            }
        }
    }

    // Final stats
    println!();
    print_summary(&summary);
    println!();
    println!("{}", log.summary());
}

/// Forward config file changes to the tick loop.
async fn poll_config(
    mut current: Config,
    commands: UnboundedSender<SessionCommand>,
    thresholds: watch::Sender<Thresholds>,
) {
    let mut interval = tokio::time::interval(CONFIG_POLL_INTERVAL);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Config unavailable, keeping previous settings: {e}");
                continue;
            }
        };

        if config.paused != current.paused {
            let command = if config.paused {
                println!();
                println!("Pausing analysis...");
                SessionCommand::Pause
            } else {
                println!();
                println!("Resuming analysis...");
                SessionCommand::Resume
            };
            if commands.send(command).is_err() {
                break;
            }
        }

        if config.thresholds != current.thresholds {
            let updated = config.effective_thresholds();
            tracing::info!("Reloaded thresholds from config file");
            thresholds.send_replace(updated);
            if commands.send(SessionCommand::UpdateThresholds(updated)).is_err() {
                break;
            }
        }

        current = config;
    }
}

fn print_summary(summary: &SessionSummary) {
    let temporal = &summary.temporal;
    println!("Posture Summary:");
    println!(
        "- Good posture: {:.0}s ({:.0}%)",
        temporal.cumulative_good_seconds,
        summary.good_ratio * 100.0
    );
    println!("- Poor posture: {:.0}s", temporal.cumulative_bad_seconds);
    println!("- Final frame skip: {}", summary.frame_skip);
    if let Some(mean) = summary.latency_mean_ms {
        match summary.latency_std_dev_ms {
            Some(std_dev) => println!("- Processing latency: {mean:.1} ms (σ {std_dev:.1} ms)"),
            None => println!("- Processing latency: {mean:.1} ms"),
        }
    }
}

#[cfg(feature = "remote-config")]
fn load_remote_thresholds(url: Option<&str>, current: Thresholds) -> Thresholds {
    let Some(url) = url else {
        return current;
    };

    match BlockingThresholdClient::new(url) {
        Ok(client) => {
            println!("  Remote thresholds: {}", client.url());
            client.fetch_or_keep(&current)
        }
        Err(e) => {
            eprintln!("Warning: Remote thresholds unavailable: {e}");
            current
        }
    }
}

#[cfg(not(feature = "remote-config"))]
fn load_remote_thresholds(url: Option<&str>, current: Thresholds) -> Thresholds {
    if url.is_some() {
        eprintln!(
            "Warning: thresholds URL ignored (remote-config feature not enabled at compile time)"
        );
    }
    current
}

fn cmd_pause() {
    let mut config = Config::load_or_default();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Analysis paused. Use 'posture-agent resume' to continue.");
}

fn cmd_resume() {
    let mut config = Config::load_or_default();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Analysis resumed.");
}

fn cmd_status() {
    let config = Config::load_or_default();

    println!("Posture Agent Status");
    println!("====================");
    println!();

    // Show config
    let thresholds = config.effective_thresholds();
    println!("Configuration:");
    println!("  Neck angle threshold: {}°", thresholds.neck_angle_deg);
    println!("  Torso angle threshold: {}°", thresholds.torso_angle_deg);
    println!("  Alignment threshold: {}px", thresholds.alignment_px);
    println!("  Forward head threshold: {}", thresholds.forward_head_ratio);
    if let Some(ref url) = config.thresholds_url {
        println!("  Thresholds URL: {url}");
    }
    println!("  Time zone: {}", config.tz());
    println!("  Paused: {}", config.paused);
    println!();

    // Load and show persisted stats if available
    let stats_path = config.stats_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("frames_seen", "Frames seen"),
                    ("frames_analyzed", "Frames analyzed"),
                    ("frames_skipped", "Frames skipped"),
                    ("invalid_frames", "Frames without a pose"),
                    ("detection_failures", "Detection failures"),
                    ("alerts_raised", "Poor posture alerts"),
                    ("governor_adjustments", "Frame skip adjustments"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_thresholds(url: Option<String>) {
    let config = Config::load_or_default();
    let url = url.or_else(|| config.thresholds_url.clone());
    let thresholds = load_remote_thresholds(url.as_deref(), config.effective_thresholds());

    println!("Posture Thresholds");
    println!("==================");
    println!();
    for (key, value) in thresholds.to_named() {
        println!("  {key}: {value}");
    }
}

fn cmd_health() {
    println!("Posture and Health");
    println!("==================");
    println!();
    print!("{}", health_conditions_text());
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = Config::load_or_default();
    let export_dir = output.unwrap_or(config.export_path.clone());

    // Find all session files
    let session_files: Vec<PathBuf> = std::fs::read_dir(&export_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension().map(|e| e == "json").unwrap_or(false)
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with("session_"))
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    if session_files.is_empty() {
        println!("No session data found in {export_dir:?}");
        println!("Run 'posture-agent start' to begin analyzing.");
        return;
    }

    println!(
        "Found {} session file(s) in {:?}",
        session_files.len(),
        export_dir
    );

    // Combine all snapshots
    let mut all_snapshots: Vec<PostureSnapshot> = Vec::new();
    for file in &session_files {
        if let Ok(content) = std::fs::read_to_string(file) {
            if let Ok(export) = serde_json::from_str::<SessionExport>(&content) {
                all_snapshots.extend(export.snapshots);
            }
        }
    }

    println!("Total snapshots: {}", all_snapshots.len());

    // Export based on format
    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = all_snapshots
            .iter()
            .filter_map(|s| serde_json::to_string(s).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        // Pretty JSON format
        match serde_json::to_string_pretty(&all_snapshots) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
