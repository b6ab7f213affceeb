//! Landmark and frame types exchanged with the pose-detection collaborator.
//!
//! Coordinates are 2D. Depth and segmentation outputs of detectors are not
//! carried; the engine only needs image-plane positions and a confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Landmarks at or below this confidence are treated as absent.
pub const MIN_LANDMARK_CONFIDENCE: f64 = 0.5;

/// Named body keypoints (COCO 17-point layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl LandmarkName {
    /// The `snake_case` name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

impl std::fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 2D point in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between two points.
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A single detected landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: LandmarkName,
    pub x: f64,
    pub y: f64,
    /// Detection confidence (0-1)
    pub confidence: f64,
}

impl Landmark {
    pub fn new(name: LandmarkName, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            name,
            x,
            y,
            confidence,
        }
    }

    /// Whether the landmark passes the confidence filter and has usable
    /// coordinates.
    pub fn is_visible(&self) -> bool {
        self.confidence > MIN_LANDMARK_CONFIDENCE && self.x.is_finite() && self.y.is_finite()
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Coordinate convention used by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Already in frame pixels
    #[default]
    Pixels,
    /// Fractions of frame width/height (0-1)
    Normalized,
}

/// Output of one pose-detection call for the primary subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedPose {
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub space: CoordinateSpace,
}

impl DetectedPose {
    pub fn new(landmarks: Vec<Landmark>, space: CoordinateSpace) -> Self {
        Self { landmarks, space }
    }

    /// Landmarks converted to pixel coordinates for a frame of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<Landmark> {
        match self.space {
            CoordinateSpace::Pixels => self.landmarks.clone(),
            CoordinateSpace::Normalized => self
                .landmarks
                .iter()
                .map(|lm| Landmark {
                    x: lm.x * width as f64,
                    y: lm.y * height as f64,
                    ..*lm
                })
                .collect(),
        }
    }
}

/// One incoming video frame notification.
///
/// Pixel data stays with the frame source; the detector is expected to know
/// how to resolve a frame by its sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Monotonic frame number assigned by the source
    pub sequence: u64,
    /// Capture time of the frame
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn new(sequence: u64, captured_at: DateTime<Utc>, width: u32, height: u32) -> Self {
        Self {
            sequence,
            captured_at,
            width,
            height,
        }
    }
}
