//! Posture classification and adaptive sampling engine.
//!
//! This module contains:
//! - Landmark selection and validation
//! - Geometry (distances, inclination angles, forward-head ratio)
//! - Threshold classification
//! - Temporal aggregation and alerting
//! - The latency-driven sampling governor
//! - The bounded chart window
//! - Report and snapshot building

pub mod aggregator;
pub mod classifier;
pub mod geometry;
pub mod governor;
pub mod report;
pub mod selector;
pub mod timeseries;

// Re-export commonly used types
pub use aggregator::{
    Advisory, AlertTransition, TemporalAggregator, TemporalState, ALERT_CONSECUTIVE_BAD_FRAMES,
};
pub use classifier::{
    classify, ClassificationResult, PostureAssessment, PostureColor, Thresholds,
};
pub use geometry::{
    compute_geometry, distance, inclination_angle, ForwardHeadMethod, GeometryResult,
    OverlayGeometry,
};
pub use governor::{GovernorAdjustment, GovernorState, SamplingGovernor};
pub use report::{
    FrameKind, FrameReport, MetricsReport, OverlayReport, PostureSnapshot, SnapshotBuilder,
    PRODUCER_NAME, SNAPSHOT_VERSION,
};
pub use selector::{select_landmarks, InvalidFrame, RequiredLandmarkSet, MANDATORY_LANDMARKS};
pub use timeseries::{ChartSnapshot, TimeSeriesWindow, CHART_CAPACITY};
