//! Demonstration of the posture engine over a scripted subject.
//!
//! This example shows how to:
//! 1. Build a synthetic (or recorded) frame source and detector
//! 2. Run the tick loop with a stop flag and a command channel
//! 3. Consume frame reports on another thread
//! 4. Watch the governor raise the frame skip when detection is slow
//! 5. Build exportable posture snapshots
//!
//! Run with: cargo run --example replay_demo [recording.jsonl]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use posture_agent::{
    core::{FrameKind, SnapshotBuilder},
    pose::{Recording, SyntheticScript},
    runner::{run_tick_loop, REPORT_CHANNEL_CAPACITY},
    stats::create_shared_log,
    FrameReport, PostureSession, Thresholds, PRIVACY_DECLARATION,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Posture Agent - Replay Demo");
    println!("===========================");
    println!();

    // Display privacy declaration
    println!("{PRIVACY_DECLARATION}");
    println!();

    let log = create_shared_log();
    let mut session = PostureSession::new(Thresholds::default(), chrono_tz::Tz::UTC, log.clone());
    let snapshot_builder = SnapshotBuilder::new();
    println!("Instance ID: {}", snapshot_builder.instance_id());
    println!();

    // Set up stop flag
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
    }

    let (_commands_tx, mut commands) = tokio::sync::mpsc::unbounded_channel();
    let (sink, reports) = crossbeam_channel::bounded::<FrameReport>(REPORT_CHANNEL_CAPACITY);

    // Print chart samples, stale replays and frame skip changes as they arrive
    let consumer = std::thread::spawn(move || {
        let mut last_skip = 0;
        let mut replayed = 0u64;
        let mut snapshots = 0usize;

        for report in reports.iter() {
            if report.kind == FrameKind::Replayed {
                replayed += 1;
            }
            if report.frame_skip != last_skip {
                println!(
                    "  Frame skip {} -> {} (latency {:.0} ms)",
                    last_skip,
                    report.frame_skip,
                    report.latency_ms.unwrap_or_default()
                );
                last_skip = report.frame_skip;
            }
            if report.chart.is_some() {
                println!("{}", report.summary_line());
                if snapshot_builder.build(&report).is_some() {
                    snapshots += 1;
                }
            }
        }

        (replayed, snapshots)
    });

    let exit = match std::env::args().nth(1) {
        Some(path) => {
            let recording = match Recording::load(std::path::Path::new(&path)) {
                Ok(recording) => recording,
                Err(e) => {
                    eprintln!("Could not load recording: {e}");
                    return;
                }
            };
            println!("Replaying {} recorded frames...", recording.len());
            println!();
            let (mut source, mut detector) = recording.into_replay(true);
            run_tick_loop(&mut source, &mut detector, &mut session, &mut commands, &sink, &running)
                .await
        }
        None => {
            // 20 s upright then 15 s slouched, with a detector slow enough
            // to push the governor into skipping frames
            println!("Running the synthetic subject for 40 seconds...");
            println!();
            let (mut source, mut detector) = SyntheticScript {
                total_frames: Some(40 * 30),
                no_pose_every: Some(97),
                detect_delay: Duration::from_millis(120),
                ..SyntheticScript::default()
            }
            .build();
            run_tick_loop(&mut source, &mut detector, &mut session, &mut commands, &sink, &running)
                .await
        }
    };

    drop(sink);
    let (replayed, snapshots) = consumer.join().unwrap_or_default();

    println!();
    println!("Loop ended: {exit:?}");
    println!("Stale replays: {replayed}");
    println!("Snapshots built: {snapshots}");
    println!();
    println!("{}", log.summary());
    println!();
    println!("Demo complete!");
}
