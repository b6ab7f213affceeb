//! Per-frame outputs for rendering, metrics, alerting and charting, plus
//! the exportable posture snapshot.

use crate::core::aggregator::{Advisory, TemporalState};
use crate::core::classifier::{ClassificationResult, PostureAssessment, PostureColor, Thresholds};
use crate::core::geometry::{ForwardHeadMethod, OverlayGeometry};
use crate::core::timeseries::ChartSnapshot;
use crate::pose::types::Point;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Snapshot schema version.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "posture-agent";

/// How a frame's report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Fully analyzed
    Analyzed,
    /// Skipped by the governor; replays the last analysis
    Replayed,
    /// Analyzed but no usable pose
    NoPose,
    /// Detector failed
    DetectionFailed,
}

/// Drawing instructions for the overlay renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayReport {
    pub color: PostureColor,
    /// Key points to mark
    pub points: Vec<Point>,
    /// Segments to draw
    pub lines: Vec<(Point, Point)>,
    /// Vertical reference guide, drawn in a neutral color
    pub guide: (Point, Point),
}

impl OverlayReport {
    pub fn new(geometry: &OverlayGeometry, is_good_posture: bool) -> Self {
        let [neck, torso, shoulders, guide] = geometry.segments();
        Self {
            color: PostureColor::for_posture(is_good_posture),
            points: vec![
                geometry.left_shoulder,
                geometry.right_shoulder,
                geometry.left_ear,
                geometry.left_hip,
            ],
            lines: vec![neck, torso, shoulders],
            guide,
        }
    }
}

/// Forward-head block; UIs without a place for it may ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardHeadMetric {
    /// Ratio as a rounded percentage
    pub percent: i64,
    /// "Good" or "Forward"
    pub status: String,
    pub method: ForwardHeadMethod,
}

/// Rounded values and labels for the metrics panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub neck_angle_deg: i64,
    pub neck_status: String,
    pub torso_angle_deg: i64,
    pub torso_status: String,
    pub shoulder_offset_px: i64,
    pub alignment_status: String,
    pub forward_head: ForwardHeadMetric,
    pub overall: String,
}

impl MetricsReport {
    pub fn new(result: &ClassificationResult, thresholds: &Thresholds) -> Self {
        let assessment = PostureAssessment::new(result, thresholds);
        let geometry = &result.geometry;

        Self {
            neck_angle_deg: geometry.neck_inclination_deg.round() as i64,
            neck_status: assessment.neck,
            torso_angle_deg: geometry.torso_inclination_deg.round() as i64,
            torso_status: assessment.torso,
            shoulder_offset_px: geometry.shoulder_offset.round() as i64,
            alignment_status: assessment.alignment,
            forward_head: ForwardHeadMetric {
                percent: (geometry.forward_head_ratio * 100.0).round() as i64,
                status: assessment.forward_head,
                method: geometry.forward_head_method,
            },
            overall: assessment.overall,
        }
    }
}

/// Everything the downstream collaborators need for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub kind: FrameKind,
    /// True when this report repeats an earlier analysis
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsReport>,
    pub advisory: Advisory,
    pub temporal: TemporalState,
    pub frame_skip: u32,
    /// Present when a chart sample was appended on this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSnapshot>,
    /// The chart was reset before this frame
    #[serde(default)]
    pub chart_reset: bool,
    /// Processing latency of the analysis behind this report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl FrameReport {
    pub fn is_good_posture(&self) -> Option<bool> {
        self.classification.map(|c| c.is_good_posture)
    }

    /// One-line console summary.
    pub fn summary_line(&self) -> String {
        match (&self.metrics, self.kind) {
            (Some(m), _) => format!(
                "[{}] {} | neck {}° ({}) torso {}° ({}) head {}% ({}) | skip {}{}",
                self.captured_at.format("%H:%M:%S"),
                m.overall,
                m.neck_angle_deg,
                m.neck_status,
                m.torso_angle_deg,
                m.torso_status,
                m.forward_head.percent,
                m.forward_head.status,
                self.frame_skip,
                self.advisory
                    .message()
                    .map(|msg| format!(" | {msg}"))
                    .unwrap_or_default()
            ),
            (None, kind) => format!(
                "[{}] {:?}{}",
                self.captured_at.format("%H:%M:%S"),
                kind,
                self.advisory
                    .message()
                    .map(|msg| format!(" | {msg}"))
                    .unwrap_or_default()
            ),
        }
    }
}

/// Producer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Exported record of one chart sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureSnapshot {
    pub snapshot_version: String,
    /// When the frame was captured (RFC3339)
    pub observed_at_utc: String,
    /// When this snapshot was built (RFC3339)
    pub computed_at_utc: String,
    pub producer: SnapshotProducer,
    pub is_good_posture: bool,
    pub metrics: MetricsReport,
    pub temporal: TemporalState,
    pub frame_skip: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// Builds [`PostureSnapshot`]s tagged with this agent instance.
pub struct SnapshotBuilder {
    instance_id: Uuid,
    host: Option<String>,
    session_id: Option<String>,
}

impl SnapshotBuilder {
    /// Create a builder with a fresh instance ID.
    pub fn new() -> Self {
        let host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());
        Self {
            instance_id: Uuid::new_v4(),
            host,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a snapshot from an analyzed report. Other kinds yield `None`.
    pub fn build(&self, report: &FrameReport) -> Option<PostureSnapshot> {
        let classification = report.classification?;
        let metrics = report.metrics.clone()?;
        if report.stale {
            return None;
        }

        let mut meta = HashMap::new();
        meta.insert(
            "sequence".to_string(),
            serde_json::Value::Number(serde_json::Number::from(report.sequence)),
        );
        meta.insert(
            "is_aligned".to_string(),
            serde_json::Value::Bool(classification.is_aligned),
        );
        meta.insert(
            "forward_head_ratio".to_string(),
            serde_json::Number::from_f64(classification.geometry.forward_head_ratio)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
        if let Some(latency) = report.latency_ms {
            meta.insert(
                "latency_ms".to_string(),
                serde_json::Number::from_f64(latency)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            );
        }
        if let Some(ref session_id) = self.session_id {
            meta.insert(
                "session_id".to_string(),
                serde_json::Value::String(session_id.clone()),
            );
        }

        Some(PostureSnapshot {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            observed_at_utc: report.captured_at.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
                host: self.host.clone(),
            },
            is_good_posture: classification.is_good_posture,
            metrics,
            temporal: report.temporal.clone(),
            frame_skip: report.frame_skip,
            meta: Some(meta),
        })
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
