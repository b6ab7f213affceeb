//! Frame and landmark acquisition seams.
//!
//! The camera feed and the neural pose detector are external collaborators.
//! This module defines the two traits the tick loop drives, plus two
//! camera-free implementations:
//!
//! - [`replay`]: replays landmark recordings (JSON Lines)
//! - [`synthetic`]: a scripted sitter alternating upright and slouched phases

pub mod replay;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use replay::{RecordedFrame, Recording, RecordingError, ReplayDetector, ReplaySource};
pub use synthetic::{SyntheticDetector, SyntheticScript, SyntheticSource};
pub use types::{
    CoordinateSpace, DetectedPose, Landmark, LandmarkName, Point, VideoFrame,
    MIN_LANDMARK_CONFIDENCE,
};

/// Delivers frame-ready notifications, one per video frame.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    /// Wait for the next frame. `None` ends the stream.
    async fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// Runs pose detection for a frame.
#[allow(async_fn_in_trait)]
pub trait PoseDetector {
    /// Detect the primary subject's landmarks.
    ///
    /// `Ok(None)` means nobody was found in the frame.
    async fn detect(&mut self, frame: &VideoFrame) -> Result<Option<DetectedPose>, DetectionError>;
}

/// Errors reported by a pose detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// The detector could not process the frame
    Failed(String),
    /// The detector has no data for the requested frame
    FrameUnavailable(u64),
}

impl std::fmt::Display for DetectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionError::Failed(e) => write!(f, "Detection failed: {e}"),
            DetectionError::FrameUnavailable(seq) => {
                write!(f, "No detection data for frame {seq}")
            }
        }
    }
}

impl std::error::Error for DetectionError {}
