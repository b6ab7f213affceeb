//! Per-subject posture session.
//!
//! A [`PostureSession`] owns one instance of every stateful engine component
//! and runs the per-frame pipeline:
//!
//! ```text
//! landmarks → selector → geometry → classifier → {aggregator, chart}
//!                                                      ↓
//!                                                 FrameReport
//! ```
//!
//! The governor decides beforehand whether a frame enters the pipeline at
//! all. State is only ever changed by the tick loop, either through a frame
//! or through a [`SessionCommand`].

use crate::core::{
    classify, compute_geometry, select_landmarks, Advisory, AlertTransition, FrameKind,
    FrameReport, GovernorState, MetricsReport, OverlayGeometry, OverlayReport, PostureSnapshot,
    SamplingGovernor, TemporalAggregator, TemporalState, Thresholds, TimeSeriesWindow,
};
use crate::pose::{DetectedPose, DetectionError, VideoFrame};
use crate::stats::{SessionStats, SharedSessionLog};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;
use std::time::Instant;

/// Latency samples kept for the session summary.
pub const LATENCY_HISTORY: usize = 600;

/// Commands applied by the tick loop between frames.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Zero the temporal state and clear the chart
    Reset,
    /// Drop frames without touching engine state
    Pause,
    Resume,
    /// Replace the classification thresholds
    UpdateThresholds(Thresholds),
}

/// Governor decision for an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run detection and the full pipeline
    Analyze,
    /// Replay the last report
    Skip,
    /// Session is paused; drop the frame
    Paused,
}

/// Summary of a session, printed at stop and written with exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub temporal: TemporalState,
    /// Share of classified time in good posture (0-1)
    pub good_ratio: f64,
    pub frame_skip: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_mean_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_std_dev_ms: Option<f64>,
    pub stats: SessionStats,
}

/// Contents of an exported session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub summary: SessionSummary,
    /// One snapshot per chart sample
    pub snapshots: Vec<PostureSnapshot>,
}

/// The posture engine for one subject.
pub struct PostureSession {
    thresholds: Thresholds,
    aggregator: TemporalAggregator,
    governor: SamplingGovernor,
    chart: TimeSeriesWindow,
    /// Capture time of the previous accepted frame
    last_accepted_at: Option<DateTime<Utc>>,
    last_report: Option<FrameReport>,
    paused: bool,
    chart_reset_pending: bool,
    latencies: VecDeque<f64>,
    started_at: DateTime<Utc>,
    log: SharedSessionLog,
}

impl PostureSession {
    pub fn new(thresholds: Thresholds, timezone: Tz, log: SharedSessionLog) -> Self {
        let (thresholds, rejected) = thresholds.sanitized();
        if !rejected.is_empty() {
            tracing::warn!(keys = ?rejected, "invalid thresholds replaced with defaults");
        }

        Self {
            thresholds,
            aggregator: TemporalAggregator::new(),
            governor: SamplingGovernor::new(),
            chart: TimeSeriesWindow::new(timezone),
            last_accepted_at: None,
            last_report: None,
            paused: false,
            chart_reset_pending: false,
            latencies: VecDeque::with_capacity(LATENCY_HISTORY),
            started_at: Utc::now(),
            log,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn temporal(&self) -> &TemporalState {
        self.aggregator.state()
    }

    pub fn governor(&self) -> GovernorState {
        self.governor.state()
    }

    pub fn chart(&self) -> &TimeSeriesWindow {
        &self.chart
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn log(&self) -> &SharedSessionLog {
        &self.log
    }

    /// Apply a command from outside the loop.
    pub fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Reset => self.reset(),
            SessionCommand::Pause => {
                if !self.paused {
                    tracing::info!("posture session paused");
                }
                self.paused = true;
            }
            SessionCommand::Resume => {
                if self.paused {
                    tracing::info!("posture session resumed");
                }
                self.paused = false;
                // Time spent paused belongs to neither bucket
                self.last_accepted_at = None;
            }
            SessionCommand::UpdateThresholds(thresholds) => {
                let (merged, rejected) = thresholds.sanitized();
                if !rejected.is_empty() {
                    tracing::warn!(keys = ?rejected, "rejected non-positive thresholds");
                }
                if merged != self.thresholds {
                    tracing::info!(?merged, "thresholds updated");
                    self.thresholds = merged;
                }
            }
        }
    }

    /// Zero the temporal state and the chart. Idempotent.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.chart.reset();
        self.last_accepted_at = None;
        self.last_report = None;
        self.chart_reset_pending = true;
        tracing::info!("posture session reset");
    }

    /// Register an incoming frame and decide what to do with it.
    pub fn admit(&mut self) -> Admission {
        self.log.record_frame_seen();
        if self.paused {
            return Admission::Paused;
        }
        if self.governor.admit() {
            Admission::Analyze
        } else {
            Admission::Skip
        }
    }

    /// Report for a frame the governor skipped.
    ///
    /// Repeats the last computed report without recomputation. Returns
    /// `None` when nothing has been computed since start or reset.
    pub fn replay(&mut self, frame: &VideoFrame) -> Option<FrameReport> {
        self.log.record_frame_skipped();
        let last = self.last_report.as_ref()?;

        Some(FrameReport {
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            kind: FrameKind::Replayed,
            stale: true,
            chart: None,
            chart_reset: false,
            ..last.clone()
        })
    }

    /// Run the pipeline for an accepted frame.
    ///
    /// `started` marks when processing of this frame began; the latency fed
    /// to the governor is measured from there to the end of classification.
    pub fn analyze(
        &mut self,
        frame: &VideoFrame,
        detection: Result<Option<DetectedPose>, DetectionError>,
        started: Instant,
    ) -> FrameReport {
        self.process(frame, detection, || started.elapsed().as_secs_f64() * 1000.0)
    }

    /// Run the pipeline with an externally measured latency.
    pub fn analyze_with_latency(
        &mut self,
        frame: &VideoFrame,
        detection: Result<Option<DetectedPose>, DetectionError>,
        latency_ms: f64,
    ) -> FrameReport {
        self.process(frame, detection, || latency_ms)
    }

    fn process(
        &mut self,
        frame: &VideoFrame,
        detection: Result<Option<DetectedPose>, DetectionError>,
        latency: impl FnOnce() -> f64,
    ) -> FrameReport {
        self.log.record_frame_analyzed();

        let dt_secs = self
            .last_accepted_at
            .map(|previous| {
                let elapsed = frame.captured_at - previous;
                elapsed
                    .num_microseconds()
                    .map(|us| us as f64 / 1_000_000.0)
                    .unwrap_or_else(|| elapsed.num_milliseconds() as f64 / 1000.0)
            })
            .unwrap_or(0.0);
        self.last_accepted_at = Some(frame.captured_at);
        let chart_reset = std::mem::take(&mut self.chart_reset_pending);

        let pose = match detection {
            Ok(Some(pose)) => pose,
            Ok(None) => {
                tracing::debug!(sequence = frame.sequence, "no subject in frame");
                self.log.record_invalid_frame();
                return self.no_pose_report(frame, FrameKind::NoPose, chart_reset);
            }
            Err(e) => {
                tracing::warn!(sequence = frame.sequence, "{e}");
                self.log.record_detection_failure();
                return self.no_pose_report(frame, FrameKind::DetectionFailed, chart_reset);
            }
        };

        let landmarks = pose.to_pixels(frame.width, frame.height);
        let set = match select_landmarks(&landmarks) {
            Ok(set) => set,
            Err(invalid) => {
                tracing::debug!(sequence = frame.sequence, "{invalid}");
                self.log.record_invalid_frame();
                return self.no_pose_report(frame, FrameKind::NoPose, chart_reset);
            }
        };

        let geometry = compute_geometry(&set);
        let classification = classify(&geometry, &self.thresholds);
        let latency_ms = latency();

        if let Some(AlertTransition::Raised) =
            self.aggregator.record(classification.is_good_posture, dt_secs)
        {
            self.log.record_alert_raised();
        }

        let chart = self
            .chart
            .append(classification.is_good_posture, frame.captured_at)
            .then(|| self.chart.snapshot());

        if let Some(adjustment) = self.governor.record_latency(latency_ms) {
            if adjustment.changed() {
                self.log.record_governor_adjustment();
            }
        }
        if self.latencies.len() == LATENCY_HISTORY {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);

        let report = FrameReport {
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            kind: FrameKind::Analyzed,
            stale: false,
            classification: Some(classification),
            overlay: Some(OverlayReport::new(
                &OverlayGeometry::from_landmarks(&set),
                classification.is_good_posture,
            )),
            metrics: Some(MetricsReport::new(&classification, &self.thresholds)),
            advisory: self.aggregator.advisory(),
            temporal: self.aggregator.state().clone(),
            frame_skip: self.governor.frame_skip(),
            chart,
            chart_reset,
            latency_ms: Some(latency_ms),
        };

        tracing::trace!(
            sequence = frame.sequence,
            good = classification.is_good_posture,
            "frame analyzed"
        );
        self.last_report = Some(report.clone());
        report
    }

    fn no_pose_report(
        &mut self,
        frame: &VideoFrame,
        kind: FrameKind,
        chart_reset: bool,
    ) -> FrameReport {
        let report = FrameReport {
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            kind,
            stale: false,
            classification: None,
            overlay: None,
            metrics: None,
            advisory: Advisory::NoPoseDetected,
            temporal: self.aggregator.state().clone(),
            frame_skip: self.governor.frame_skip(),
            chart: None,
            chart_reset,
            latency_ms: None,
        };
        self.last_report = Some(report.clone());
        report
    }

    pub fn summary(&self) -> SessionSummary {
        let temporal = self.aggregator.state().clone();
        let latency_mean_ms = if self.latencies.is_empty() {
            None
        } else {
            Some(self.latencies.iter().mean())
        };
        let latency_std_dev_ms = if self.latencies.len() < 2 {
            None
        } else {
            Some(self.latencies.iter().std_dev())
        };

        SessionSummary {
            started_at: self.started_at,
            ended_at: Utc::now(),
            thresholds: self.thresholds,
            good_ratio: temporal.good_ratio(),
            temporal,
            frame_skip: self.governor.frame_skip(),
            latency_mean_ms,
            latency_std_dev_ms,
            stats: self.log.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ALERT_CONSECUTIVE_BAD_FRAMES;
    use crate::pose::{CoordinateSpace, Landmark, LandmarkName};
    use crate::stats::create_shared_log;

    fn session() -> PostureSession {
        PostureSession::new(Thresholds::default(), Tz::UTC, create_shared_log())
    }

    fn frame_at(sequence: u64, millis: i64) -> VideoFrame {
        let start = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        VideoFrame::new(
            sequence,
            start + chrono::Duration::milliseconds(millis),
            640,
            480,
        )
    }

    fn worked_example() -> DetectedPose {
        DetectedPose::new(
            vec![
                Landmark::new(LandmarkName::LeftShoulder, 100.0, 200.0, 0.9),
                Landmark::new(LandmarkName::RightShoulder, 160.0, 200.0, 0.9),
                Landmark::new(LandmarkName::LeftEar, 90.0, 100.0, 0.9),
                Landmark::new(LandmarkName::LeftHip, 110.0, 300.0, 0.9),
            ],
            CoordinateSpace::Pixels,
        )
    }

    fn slouched() -> DetectedPose {
        DetectedPose::new(
            vec![
                Landmark::new(LandmarkName::LeftShoulder, 100.0, 200.0, 0.9),
                Landmark::new(LandmarkName::RightShoulder, 160.0, 200.0, 0.9),
                Landmark::new(LandmarkName::LeftEar, 180.0, 140.0, 0.9),
                Landmark::new(LandmarkName::LeftHip, 60.0, 300.0, 0.9),
            ],
            CoordinateSpace::Pixels,
        )
    }

    #[test]
    fn test_worked_example_through_pipeline() {
        let mut session = session();
        assert_eq!(session.admit(), Admission::Analyze);
        let report = session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);

        assert_eq!(report.kind, FrameKind::Analyzed);
        let classification = report.classification.unwrap();
        assert!(classification.is_good_posture);
        assert_eq!(classification.geometry.shoulder_offset, 60.0);
        assert_eq!(classification.geometry.neck_inclination_deg, 6.0);
        assert_eq!(classification.geometry.torso_inclination_deg, 6.0);
        assert_eq!(classification.geometry.forward_head_ratio, 0.0);
        assert_eq!(report.overlay.unwrap().color, crate::core::PostureColor::Green);
        assert!(report.chart.is_some());
        assert_eq!(report.advisory, Advisory::None);
    }

    #[test]
    fn test_missing_landmark_leaves_temporal_state_alone() {
        let mut session = session();
        session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);
        let before = session.temporal().clone();

        let mut pose = worked_example();
        pose.landmarks.retain(|lm| lm.name != LandmarkName::LeftHip);
        let report = session.analyze_with_latency(&frame_at(1, 500), Ok(Some(pose)), 10.0);

        assert_eq!(report.kind, FrameKind::NoPose);
        assert_eq!(report.advisory, Advisory::NoPoseDetected);
        assert!(report.classification.is_none());
        assert!(report.chart.is_none());
        assert_eq!(session.temporal(), &before);
        assert_eq!(session.log().stats().invalid_frames, 1);
    }

    #[test]
    fn test_non_finite_landmark_is_no_pose() {
        let mut session = session();
        let pose = DetectedPose::new(
            vec![
                Landmark::new(LandmarkName::LeftShoulder, f64::NAN, 200.0, 0.9),
                Landmark::new(LandmarkName::RightShoulder, 160.0, 200.0, 0.9),
                Landmark::new(LandmarkName::LeftEar, 300.0, 100.0, 0.9),
                Landmark::new(LandmarkName::LeftHip, 110.0, 300.0, 0.9),
            ],
            CoordinateSpace::Pixels,
        );

        let report = session.analyze_with_latency(&frame_at(0, 0), Ok(Some(pose)), 10.0);

        assert_eq!(report.kind, FrameKind::NoPose);
        assert!(report.classification.is_none());
        assert_eq!(session.temporal().consecutive_good_frames, 0);
        assert_eq!(session.log().stats().invalid_frames, 1);
    }

    #[test]
    fn test_delta_keeps_sub_millisecond_precision() {
        let mut session = session();
        let first = frame_at(0, 0);
        let second = VideoFrame::new(
            1,
            first.captured_at + chrono::Duration::microseconds(33_333),
            640,
            480,
        );

        session.analyze_with_latency(&first, Ok(Some(worked_example())), 10.0);
        session.analyze_with_latency(&second, Ok(Some(worked_example())), 10.0);

        let good = session.temporal().cumulative_good_seconds;
        assert!((good - 0.033_333).abs() < 1e-9, "got {good}");
    }

    #[test]
    fn test_invalid_frames_do_not_feed_governor() {
        let mut session = session();
        for i in 0..40 {
            session.analyze_with_latency(&frame_at(i, i as i64 * 33), Ok(None), 500.0);
        }
        assert_eq!(session.governor().frame_skip, 0);
    }

    #[test]
    fn test_detection_failure_is_recovered() {
        let mut session = session();
        let report = session.analyze_with_latency(
            &frame_at(0, 0),
            Err(DetectionError::Failed("model crashed".to_string())),
            10.0,
        );
        assert_eq!(report.kind, FrameKind::DetectionFailed);
        assert_eq!(report.advisory, Advisory::NoPoseDetected);
        assert_eq!(session.log().stats().detection_failures, 1);
    }

    #[test]
    fn test_delta_between_accepted_frames() {
        let mut session = session();
        session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);
        // A no-pose frame in between still advances the clock
        session.analyze_with_latency(&frame_at(1, 1000), Ok(None), 10.0);
        session.analyze_with_latency(&frame_at(2, 1500), Ok(Some(worked_example())), 10.0);

        assert_eq!(session.temporal().cumulative_good_seconds, 0.5);
        assert_eq!(session.temporal().consecutive_good_frames, 2);
    }

    #[test]
    fn test_sustained_bad_posture_alert() {
        let mut session = session();
        let mut last = None;
        for i in 0..=ALERT_CONSECUTIVE_BAD_FRAMES {
            let report =
                session.analyze_with_latency(&frame_at(i, i as i64 * 33), Ok(Some(slouched())), 10.0);
            if i < ALERT_CONSECUTIVE_BAD_FRAMES {
                assert!(!report.temporal.alert_active);
            }
            last = Some(report);
        }
        let last = last.unwrap();
        assert!(last.temporal.alert_active);
        assert_eq!(last.advisory, Advisory::SustainedPoorPosture);
        assert_eq!(session.log().stats().alerts_raised, 1);

        let next = ALERT_CONSECUTIVE_BAD_FRAMES + 1;
        let report = session.analyze_with_latency(
            &frame_at(next, next as i64 * 33),
            Ok(Some(worked_example())),
            10.0,
        );
        assert!(!report.temporal.alert_active);
        assert_eq!(report.advisory, Advisory::None);
    }

    #[test]
    fn test_skipped_frames_replay_stale_report() {
        let mut session = session();
        let first = session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);
        let replayed = session.replay(&frame_at(1, 33)).unwrap();

        assert!(replayed.stale);
        assert_eq!(replayed.kind, FrameKind::Replayed);
        assert_eq!(replayed.sequence, 1);
        assert_eq!(replayed.classification, first.classification);
        assert!(replayed.chart.is_none());
        assert_eq!(session.temporal().consecutive_good_frames, 1);
        assert_eq!(session.log().stats().frames_skipped, 1);
    }

    #[test]
    fn test_slow_frames_raise_frame_skip() {
        let mut session = session();
        for i in 0..30 {
            session.analyze_with_latency(&frame_at(i, i as i64 * 33), Ok(Some(worked_example())), 120.0);
        }
        assert_eq!(session.governor().frame_skip, 1);
        assert_eq!(session.log().stats().governor_adjustments, 1);

        // Direct analysis leaves the frame counter at 0
        assert_eq!(session.admit(), Admission::Analyze);
        assert_eq!(session.admit(), Admission::Skip);
    }

    #[test]
    fn test_pause_drops_frames() {
        let mut session = session();
        session.apply(SessionCommand::Pause);
        assert_eq!(session.admit(), Admission::Paused);
        assert_eq!(session.governor().frame_counter, 0);

        session.apply(SessionCommand::Resume);
        assert_eq!(session.admit(), Admission::Analyze);
        assert_eq!(session.log().stats().frames_seen, 2);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = session();
        session.analyze_with_latency(&frame_at(0, 0), Ok(Some(slouched())), 10.0);
        session.analyze_with_latency(&frame_at(1, 2000), Ok(Some(slouched())), 10.0);

        session.apply(SessionCommand::Reset);
        let once = session.temporal().clone();
        session.apply(SessionCommand::Reset);
        assert_eq!(session.temporal(), &once);
        assert_eq!(once, TemporalState::default());
        assert_eq!(session.chart().filled(), 0);
        assert!(session.replay(&frame_at(2, 2033)).is_none());

        let report = session.analyze_with_latency(&frame_at(3, 5000), Ok(Some(worked_example())), 10.0);
        assert!(report.chart_reset);
        // First frame after reset has no elapsed time
        assert_eq!(report.temporal.cumulative_good_seconds, 0.0);
    }

    #[test]
    fn test_threshold_update_rejects_invalid_values() {
        let mut session = session();
        session.apply(SessionCommand::UpdateThresholds(Thresholds {
            neck_angle_deg: 5.0,
            torso_angle_deg: -1.0,
            ..Thresholds::default()
        }));
        assert_eq!(session.thresholds().neck_angle_deg, 5.0);
        assert_eq!(session.thresholds().torso_angle_deg, 10.0);

        // Worked example's 6° neck is now poor
        let report = session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);
        assert_eq!(report.is_good_posture(), Some(false));
    }

    #[test]
    fn test_normalized_landmarks_are_scaled() {
        let mut session = session();
        let pose = DetectedPose::new(
            worked_example()
                .landmarks
                .into_iter()
                .map(|lm| Landmark::new(lm.name, lm.x / 640.0, lm.y / 480.0, lm.confidence))
                .collect(),
            CoordinateSpace::Normalized,
        );
        let report = session.analyze_with_latency(&frame_at(0, 0), Ok(Some(pose)), 10.0);
        let geometry = report.classification.unwrap().geometry;
        assert!((geometry.shoulder_offset - 60.0).abs() < 1e-9);
        assert_eq!(geometry.neck_inclination_deg, 6.0);
    }

    #[test]
    fn test_summary_latency_statistics() {
        let mut session = session();
        assert!(session.summary().latency_mean_ms.is_none());

        session.analyze_with_latency(&frame_at(0, 0), Ok(Some(worked_example())), 10.0);
        session.analyze_with_latency(&frame_at(1, 1000), Ok(Some(slouched())), 30.0);
        let summary = session.summary();

        assert_eq!(summary.latency_mean_ms, Some(20.0));
        assert!(summary.latency_std_dev_ms.unwrap() > 0.0);
        assert_eq!(summary.stats.frames_analyzed, 2);
        assert_eq!(summary.temporal.cumulative_bad_seconds, 1.0);
    }
}
