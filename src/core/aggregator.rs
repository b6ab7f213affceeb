//! Temporal aggregation of per-frame classifications.
//!
//! Turns a stream of good/bad judgments into consecutive-frame counts,
//! cumulative durations and a sustained-poor-posture alert.

use serde::{Deserialize, Serialize};

/// Consecutive bad frames needed before the alert fires (strictly more than).
///
/// This is a sample count, so its wall-clock meaning follows the sampling
/// rate chosen by the governor.
pub const ALERT_CONSECUTIVE_BAD_FRAMES: u64 = 300;

/// Running posture state for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalState {
    pub consecutive_good_frames: u64,
    pub consecutive_bad_frames: u64,
    pub cumulative_good_seconds: f64,
    pub cumulative_bad_seconds: f64,
    pub alert_active: bool,
}

impl TemporalState {
    /// Total classified time.
    pub fn total_seconds(&self) -> f64 {
        self.cumulative_good_seconds + self.cumulative_bad_seconds
    }

    /// Share of classified time spent in good posture (0-1).
    pub fn good_ratio(&self) -> f64 {
        let total = self.total_seconds();
        if total <= 0.0 {
            0.0
        } else {
            self.cumulative_good_seconds / total
        }
    }
}

/// What the alerting collaborator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    #[default]
    None,
    /// Alert is active
    SustainedPoorPosture,
    /// The frame had no usable pose
    NoPoseDetected,
}

impl Advisory {
    /// Message text, if any.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Advisory::None => None,
            Advisory::SustainedPoorPosture => {
                Some("You've been in a poor posture for a while. Please sit upright.")
            }
            Advisory::NoPoseDetected => {
                Some("No pose detected. Please make sure your upper body is visible.")
            }
        }
    }
}

/// Alert edge produced by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    Raised,
    Cleared,
}

/// Accumulates classifications into [`TemporalState`].
#[derive(Debug, Default)]
pub struct TemporalAggregator {
    state: TemporalState,
}

impl TemporalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TemporalState {
        &self.state
    }

    /// Record one analyzed frame.
    ///
    /// `dt_secs` is the time since the previous accepted frame. Negative or
    /// non-finite values count as zero.
    pub fn record(&mut self, is_good_posture: bool, dt_secs: f64) -> Option<AlertTransition> {
        let dt = if dt_secs.is_finite() {
            dt_secs.max(0.0)
        } else {
            0.0
        };
        let was_alerting = self.state.alert_active;

        if is_good_posture {
            self.state.consecutive_good_frames += 1;
            self.state.consecutive_bad_frames = 0;
            self.state.cumulative_good_seconds += dt;
            self.state.alert_active = false;
        } else {
            self.state.consecutive_bad_frames += 1;
            self.state.consecutive_good_frames = 0;
            self.state.cumulative_bad_seconds += dt;
            if self.state.consecutive_bad_frames > ALERT_CONSECUTIVE_BAD_FRAMES {
                self.state.alert_active = true;
            }
        }

        match (was_alerting, self.state.alert_active) {
            (false, true) => {
                tracing::info!(
                    bad_frames = self.state.consecutive_bad_frames,
                    "sustained poor posture alert raised"
                );
                Some(AlertTransition::Raised)
            }
            (true, false) => {
                tracing::info!("poor posture alert cleared");
                Some(AlertTransition::Cleared)
            }
            _ => None,
        }
    }

    /// Advisory for an analyzed frame.
    pub fn advisory(&self) -> Advisory {
        if self.state.alert_active {
            Advisory::SustainedPoorPosture
        } else {
            Advisory::None
        }
    }

    /// Zero all counters and clear the alert.
    pub fn reset(&mut self) {
        self.state = TemporalState::default();
    }
}
