//! Posture Agent - sitting-posture classification with adaptive sampling.
//!
//! This library turns a stream of detected body landmarks into a running
//! judgment of sitting posture, and adapts how often frames are analyzed to
//! keep processing latency bounded.
//!
//! # Privacy Guarantees
//!
//! - **No images**: Frame pixels never reach this crate, only landmark coordinates
//! - **No landmark storage**: Landmarks are discarded after each frame
//! - **Bounded history**: Only a 60-second chart window is kept in memory
//! - **Transparency**: Session statistics are logged and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Posture Agent                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ FrameSource │──▶│  Governor   │──▶│PoseDetector │       │
//! │  │             │   │ (frame skip)│   │             │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Classifier  │◀──│  Geometry   │◀──│  Selector   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                                   │
//! │         ▼                                                   │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Aggregator  │──▶│ FrameReport │◀──│ Chart (60s) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use posture_agent::{
//!     pose::SyntheticScript,
//!     runner::{run_tick_loop, REPORT_CHANNEL_CAPACITY},
//!     stats::create_shared_log,
//!     PostureSession, Thresholds,
//! };
//! use std::sync::atomic::AtomicBool;
//!
//! # async fn demo() {
//! let (mut source, mut detector) = SyntheticScript::default().build();
//! let mut session = PostureSession::new(Thresholds::default(), chrono_tz::Tz::UTC, create_shared_log());
//! let (_commands_tx, mut commands) = tokio::sync::mpsc::unbounded_channel();
//! let (sink, reports) = crossbeam_channel::bounded(REPORT_CHANNEL_CAPACITY);
//! let running = AtomicBool::new(true);
//!
//! run_tick_loop(&mut source, &mut detector, &mut session, &mut commands, &sink, &running).await;
//! for report in reports.try_iter() {
//!     println!("{}", report.summary_line());
//! }
//! # }
//! ```

pub mod config;
pub mod core;
pub mod health;
pub mod pose;
pub mod remote;
pub mod runner;
pub mod session;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    Advisory, ClassificationResult, FrameKind, FrameReport, GeometryResult, PostureSnapshot,
    SnapshotBuilder, TemporalState, Thresholds,
};
pub use pose::{DetectedPose, DetectionError, FrameSource, Landmark, LandmarkName, PoseDetector, VideoFrame};
pub use remote::RemoteConfigError;
pub use session::{PostureSession, SessionCommand, SessionExport, SessionSummary};
pub use stats::{SessionLog, SessionStats, SharedSessionLog};

// Remote config re-exports (when enabled)
#[cfg(feature = "remote-config")]
pub use remote::{BlockingThresholdClient, ThresholdClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              POSTURE AGENT - PRIVACY DECLARATION                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent estimates sitting posture from body landmarks.       ║
║                                                                  ║
║  ✓ WHAT WE PROCESS:                                              ║
║    • Positions of shoulders, ears, nose and hips per frame       ║
║    • Neck and torso angles derived from them                     ║
║    • Whether each analyzed frame looked like good posture        ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Camera images or video                                      ║
║    • Landmark coordinates beyond the current frame               ║
║    • Anything identifying who is in view                         ║
║                                                                  ║
║  All data is processed locally. Only a 60-second chart and       ║
║  per-second posture samples (if exported) are retained.          ║
║                                                                  ║
║  You can view session statistics anytime with:                   ║
║    posture-agent status                                          ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER KEEP"));
        assert!(PRIVACY_DECLARATION.contains("Camera images"));
    }
}
