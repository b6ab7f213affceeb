//! Single-threaded tick loop.
//!
//! One tick per frame delivered by the [`FrameSource`]:
//!
//! 1. apply pending [`SessionCommand`]s
//! 2. ask the governor to admit the frame
//! 3. await detection for admitted frames
//! 4. run the session pipeline and emit the [`FrameReport`]
//!
//! The stop flag is checked before every tick and again after detection,
//! so a result that arrives after stop was requested is discarded. Each tick
//! yields to the runtime once so tasks sharing a current-thread runtime keep
//! running during an unpaced replay.

use crate::core::FrameReport;
use crate::pose::{FrameSource, PoseDetector};
use crate::session::{Admission, PostureSession, SessionCommand};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

/// Capacity of the report channel handed to consumers.
pub const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The stop flag was cleared
    Stopped,
    /// The frame source has no more frames
    SourceEnded,
}

/// Drive frames through the session until stopped or the source ends.
pub async fn run_tick_loop<S, D>(
    source: &mut S,
    detector: &mut D,
    session: &mut PostureSession,
    commands: &mut UnboundedReceiver<SessionCommand>,
    sink: &Sender<FrameReport>,
    running: &AtomicBool,
) -> LoopExit
where
    S: FrameSource,
    D: PoseDetector,
{
    while running.load(Ordering::SeqCst) {
        // Sources and detectors that never suspend would otherwise starve
        // the server and config poller sharing this runtime
        tokio::task::yield_now().await;

        let Some(frame) = source.next_frame().await else {
            tracing::info!("frame source ended");
            return LoopExit::SourceEnded;
        };

        while let Ok(command) = commands.try_recv() {
            session.apply(command);
        }

        let report = match session.admit() {
            Admission::Paused => continue,
            Admission::Skip => session.replay(&frame),
            Admission::Analyze => {
                let started = Instant::now();
                let detection = detector.detect(&frame).await;

                if !running.load(Ordering::SeqCst) {
                    tracing::debug!(sequence = frame.sequence, "stop requested, discarding detection");
                    return LoopExit::Stopped;
                }

                Some(session.analyze(&frame, detection, started))
            }
        };

        if let Some(report) = report {
            emit(sink, report);
        }
    }

    LoopExit::Stopped
}

fn emit(sink: &Sender<FrameReport>, report: FrameReport) {
    match sink.try_send(report) {
        Ok(()) => {}
        Err(TrySendError::Full(report)) => {
            tracing::debug!(sequence = report.sequence, "report channel full, dropping report");
        }
        Err(TrySendError::Disconnected(report)) => {
            tracing::trace!(sequence = report.sequence, "no report consumer");
        }
    }
}
