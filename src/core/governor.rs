//! Latency-driven frame admission.
//!
//! The governor decides which incoming frames get full analysis. It watches
//! processing latency in blocks of [`LATENCY_WINDOW`] samples and moves the
//! frame skip up when analysis is slow and down when it is fast. The two
//! thresholds leave a dead band between them so the skip does not oscillate.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Number of latency samples averaged per adjustment.
pub const LATENCY_WINDOW: usize = 30;

/// Largest number of frames skipped between two analyzed frames.
pub const MAX_FRAME_SKIP: u32 = 3;

/// Mean latency above which the skip increases.
pub const SLOW_LATENCY_MS: f64 = 100.0;

/// Mean latency below which the skip decreases.
pub const FAST_LATENCY_MS: f64 = 50.0;

/// Observable governor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorState {
    pub frame_skip: u32,
    pub recent_latencies_ms: Vec<f64>,
    /// Frames seen so far, admitted or not
    pub frame_counter: u64,
}

/// A completed latency window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorAdjustment {
    pub mean_latency_ms: f64,
    pub previous_skip: u32,
    pub frame_skip: u32,
}

impl GovernorAdjustment {
    pub fn changed(&self) -> bool {
        self.previous_skip != self.frame_skip
    }
}

/// Adaptive frame-skip controller.
#[derive(Debug)]
pub struct SamplingGovernor {
    frame_skip: u32,
    frame_counter: u64,
    latencies: VecDeque<f64>,
}

impl Default for SamplingGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingGovernor {
    pub fn new() -> Self {
        Self {
            frame_skip: 0,
            frame_counter: 0,
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }

    /// Start from a given skip (clamped to the allowed range).
    pub fn with_frame_skip(frame_skip: u32) -> Self {
        Self {
            frame_skip: frame_skip.min(MAX_FRAME_SKIP),
            ..Self::new()
        }
    }

    pub fn frame_skip(&self) -> u32 {
        self.frame_skip
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Register an incoming frame and decide whether to analyze it.
    pub fn admit(&mut self) -> bool {
        let accepted = self.frame_counter % (self.frame_skip as u64 + 1) == 0;
        self.frame_counter += 1;
        accepted
    }

    /// Record the processing latency of an analyzed frame.
    ///
    /// Returns the adjustment when this sample completes a window.
    pub fn record_latency(&mut self, latency_ms: f64) -> Option<GovernorAdjustment> {
        let latency = if latency_ms.is_finite() {
            latency_ms.max(0.0)
        } else {
            0.0
        };
        self.latencies.push_back(latency);

        if self.latencies.len() < LATENCY_WINDOW {
            return None;
        }

        let mean_latency_ms = self.latencies.iter().mean();
        self.latencies.clear();

        let previous_skip = self.frame_skip;
        if mean_latency_ms > SLOW_LATENCY_MS {
            self.frame_skip = (self.frame_skip + 1).min(MAX_FRAME_SKIP);
        } else if mean_latency_ms < FAST_LATENCY_MS && self.frame_skip > 0 {
            self.frame_skip -= 1;
        }

        let adjustment = GovernorAdjustment {
            mean_latency_ms,
            previous_skip,
            frame_skip: self.frame_skip,
        };

        if adjustment.changed() {
            tracing::info!(
                mean_latency_ms,
                from = previous_skip,
                to = self.frame_skip,
                "frame skip adjusted"
            );
        } else {
            tracing::debug!(mean_latency_ms, frame_skip = self.frame_skip, "frame skip unchanged");
        }

        Some(adjustment)
    }

    pub fn state(&self) -> GovernorState {
        GovernorState {
            frame_skip: self.frame_skip,
            recent_latencies_ms: self.latencies.iter().copied().collect(),
            frame_counter: self.frame_counter,
        }
    }
}
