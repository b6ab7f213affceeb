//! Session statistics log.
//!
//! Tracks what the agent has processed without storing any frame or
//! landmark data. Counters are atomic so a status server or CLI can read
//! them while the tick loop runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for the current session.
#[derive(Debug)]
pub struct SessionLog {
    /// Frames delivered by the source
    frames_seen: AtomicU64,
    /// Frames admitted by the governor and sent to the detector
    frames_analyzed: AtomicU64,
    /// Frames skipped by the governor
    frames_skipped: AtomicU64,
    /// Analyzed frames without a usable pose
    invalid_frames: AtomicU64,
    /// Detector errors
    detection_failures: AtomicU64,
    /// Sustained poor posture alerts raised
    alerts_raised: AtomicU64,
    /// Frame skip changes made by the governor
    governor_adjustments: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Totals from earlier sessions, loaded from `persist_path`
    baseline: Counts,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            frames_seen: AtomicU64::new(0),
            frames_analyzed: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            invalid_frames: AtomicU64::new(0),
            detection_failures: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            governor_adjustments: AtomicU64::new(0),
            session_start: Utc::now(),
            baseline: Counts::default(),
            persist_path: None,
        }
    }

    /// Create a log whose saved totals accumulate onto those at `path`.
    ///
    /// The counters of the new session still start at zero.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous session stats: {e}");
        }

        log
    }

    pub fn record_frame_seen(&self) {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_analyzed(&self) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_frame(&self) {
        self.invalid_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_failure(&self) {
        self.detection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_raised(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_governor_adjustment(&self) {
        self.governor_adjustments.fetch_add(1, Ordering::Relaxed);
    }

    fn counts(&self) -> Counts {
        Counts {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            governor_adjustments: self.governor_adjustments.load(Ordering::Relaxed),
        }
    }

    /// Statistics of this session only.
    pub fn stats(&self) -> SessionStats {
        self.stats_from(self.counts())
    }

    /// Statistics of this session added to the persisted totals.
    pub fn cumulative_stats(&self) -> SessionStats {
        self.stats_from(self.baseline.plus(&self.counts()))
    }

    fn stats_from(&self, counts: Counts) -> SessionStats {
        SessionStats {
            frames_seen: counts.frames_seen,
            frames_analyzed: counts.frames_analyzed,
            frames_skipped: counts.frames_skipped,
            invalid_frames: counts.invalid_frames,
            detection_failures: counts.detection_failures,
            alerts_raised: counts.alerts_raised,
            governor_adjustments: counts.governor_adjustments,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary text for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames seen: {}\n\
             - Frames analyzed: {}\n\
             - Frames skipped: {}\n\
             - Frames without a pose: {}\n\
             - Detection failures: {}\n\
             - Poor posture alerts: {}\n\
             - Frame skip adjustments: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy:\n\
             - No video frames stored\n\
             - Landmarks discarded after each frame",
            stats.frames_seen,
            stats.frames_analyzed,
            stats.frames_skipped,
            stats.invalid_frames,
            stats.detection_failures,
            stats.alerts_raised,
            stats.governor_adjustments,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                counts: self.baseline.plus(&self.counts()),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.baseline = persisted.counts;
            }
        }
        Ok(())
    }

    /// Reset this session's counters. Persisted totals are kept.
    pub fn reset(&self) {
        self.frames_seen.store(0, Ordering::Relaxed);
        self.frames_analyzed.store(0, Ordering::Relaxed);
        self.frames_skipped.store(0, Ordering::Relaxed);
        self.invalid_frames.store(0, Ordering::Relaxed);
        self.detection_failures.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
        self.governor_adjustments.store(0, Ordering::Relaxed);
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_seen: u64,
    pub frames_analyzed: u64,
    pub frames_skipped: u64,
    pub invalid_frames: u64,
    pub detection_failures: u64,
    pub alerts_raised: u64,
    pub governor_adjustments: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Counts {
    frames_seen: u64,
    frames_analyzed: u64,
    frames_skipped: u64,
    invalid_frames: u64,
    detection_failures: u64,
    alerts_raised: u64,
    governor_adjustments: u64,
}

impl Counts {
    fn plus(&self, other: &Counts) -> Counts {
        Counts {
            frames_seen: self.frames_seen + other.frames_seen,
            frames_analyzed: self.frames_analyzed + other.frames_analyzed,
            frames_skipped: self.frames_skipped + other.frames_skipped,
            invalid_frames: self.invalid_frames + other.invalid_frames,
            detection_failures: self.detection_failures + other.detection_failures,
            alerts_raised: self.alerts_raised + other.alerts_raised,
            governor_adjustments: self.governor_adjustments + other.governor_adjustments,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(flatten)]
    counts: Counts,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared session log.
pub type SharedSessionLog = Arc<SessionLog>;

pub fn create_shared_log() -> SharedSessionLog {
    Arc::new(SessionLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedSessionLog {
    Arc::new(SessionLog::with_persistence(path))
}
