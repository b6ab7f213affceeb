//! Scripted synthetic subject for demos and smoke tests.
//!
//! The subject is seen from the left side and alternates between an upright
//! phase and a slouched, head-forward phase.

use crate::pose::types::{CoordinateSpace, DetectedPose, Landmark, LandmarkName, VideoFrame};
use crate::pose::{DetectionError, FrameSource, PoseDetector};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timing of the synthetic subject.
#[derive(Debug, Clone)]
pub struct SyntheticScript {
    /// Frames per second delivered by the source
    pub fps: u32,
    /// Seconds spent upright per cycle
    pub upright_secs: u64,
    /// Seconds spent slouched per cycle
    pub slouched_secs: u64,
    /// Stop after this many frames
    pub total_frames: Option<u64>,
    /// Every Nth frame nobody is in view
    pub no_pose_every: Option<u64>,
    /// Artificial detection delay
    pub detect_delay: Duration,
    /// Sleep between frames so the stream runs at `fps`
    pub paced: bool,
}

impl Default for SyntheticScript {
    fn default() -> Self {
        Self {
            fps: 30,
            upright_secs: 20,
            slouched_secs: 15,
            total_frames: None,
            no_pose_every: None,
            detect_delay: Duration::ZERO,
            paced: true,
        }
    }
}

impl SyntheticScript {
    /// Build the frame source and detector for this script.
    pub fn build(self) -> (SyntheticSource, SyntheticDetector) {
        let start = Utc::now();
        (
            SyntheticSource {
                script: self.clone(),
                start,
                next_sequence: 0,
            },
            SyntheticDetector { script: self },
        )
    }

    /// Whether the subject is upright at a given frame.
    pub fn is_upright(&self, sequence: u64) -> bool {
        let fps = self.fps.max(1) as u64;
        let cycle = (self.upright_secs + self.slouched_secs).max(1);
        (sequence / fps) % cycle < self.upright_secs
    }
}

/// Frame clock for the synthetic subject.
pub struct SyntheticSource {
    script: SyntheticScript,
    start: DateTime<Utc>,
    next_sequence: u64,
}

impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        if let Some(total) = self.script.total_frames {
            if self.next_sequence >= total {
                return None;
            }
        }

        let frame_ms = 1000 / self.script.fps.max(1) as u64;
        if self.script.paced && self.next_sequence > 0 {
            tokio::time::sleep(Duration::from_millis(frame_ms)).await;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let captured_at =
            self.start + chrono::Duration::milliseconds((sequence * frame_ms) as i64);

        Some(VideoFrame::new(sequence, captured_at, 640, 480))
    }
}

/// Detector producing the scripted landmarks.
pub struct SyntheticDetector {
    script: SyntheticScript,
}

impl PoseDetector for SyntheticDetector {
    async fn detect(&mut self, frame: &VideoFrame) -> Result<Option<DetectedPose>, DetectionError> {
        if !self.script.detect_delay.is_zero() {
            tokio::time::sleep(self.script.detect_delay).await;
        }

        if let Some(every) = self.script.no_pose_every {
            if every > 0 && frame.sequence % every == every - 1 {
                return Ok(None);
            }
        }

        let landmarks = if self.script.is_upright(frame.sequence) {
            upright_pose()
        } else {
            slouched_pose()
        };
        Ok(Some(DetectedPose::new(landmarks, CoordinateSpace::Pixels)))
    }
}

fn upright_pose() -> Vec<Landmark> {
    vec![
        Landmark::new(LandmarkName::LeftShoulder, 300.0, 240.0, 0.95),
        Landmark::new(LandmarkName::RightShoulder, 320.0, 242.0, 0.8),
        Landmark::new(LandmarkName::LeftEar, 295.0, 150.0, 0.9),
        Landmark::new(LandmarkName::Nose, 297.0, 160.0, 0.9),
        Landmark::new(LandmarkName::LeftHip, 305.0, 380.0, 0.9),
    ]
}

fn slouched_pose() -> Vec<Landmark> {
    vec![
        Landmark::new(LandmarkName::LeftShoulder, 325.0, 250.0, 0.95),
        Landmark::new(LandmarkName::RightShoulder, 345.0, 252.0, 0.8),
        Landmark::new(LandmarkName::LeftEar, 375.0, 185.0, 0.9),
        Landmark::new(LandmarkName::Nose, 390.0, 195.0, 0.9),
        Landmark::new(LandmarkName::LeftHip, 305.0, 380.0, 0.9),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_schedule() {
        let script = SyntheticScript {
            fps: 10,
            upright_secs: 2,
            slouched_secs: 1,
            ..Default::default()
        };
        assert!(script.is_upright(0));
        assert!(script.is_upright(19));
        assert!(!script.is_upright(20));
        assert!(!script.is_upright(29));
        assert!(script.is_upright(30));
    }

    #[tokio::test]
    async fn test_total_frames_and_gaps() {
        let script = SyntheticScript {
            total_frames: Some(4),
            no_pose_every: Some(2),
            paced: false,
            ..Default::default()
        };
        let (mut source, mut detector) = script.build();

        let mut found = Vec::new();
        while let Some(frame) = source.next_frame().await {
            found.push(detector.detect(&frame).await.unwrap().is_some());
        }
        assert_eq!(found, vec![true, false, true, false]);
    }
}
