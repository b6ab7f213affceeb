//! Replay of recorded landmark streams.
//!
//! A recording is a JSON Lines file with one detected frame per line:
//!
//! ```text
//! {"timestamp_ms":1700000000000,"width":640,"height":480,"space":"pixels","landmarks":[...]}
//! {"timestamp_ms":1700000000033,"width":640,"height":480,"landmarks":[],"error":"model timeout"}
//! ```
//!
//! An empty `landmarks` list replays as "nobody in view"; a present `error`
//! replays as a detection failure.

use crate::pose::types::{CoordinateSpace, DetectedPose, Landmark, VideoFrame};
use crate::pose::{DetectionError, FrameSource, PoseDetector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

/// One line of a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Capture time in Unix milliseconds
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub space: CoordinateSpace,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    /// Detector error recorded for this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A loaded landmark recording.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self { frames }
    }

    /// Load a recording from a JSON Lines file.
    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RecordingError::IoError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse JSON Lines content. Blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self, RecordingError> {
        let mut frames = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame =
                serde_json::from_str(line).map_err(|e| RecordingError::ParseError {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(RecordingError::Empty);
        }
        Ok(Self { frames })
    }

    /// Write the recording as JSON Lines.
    pub fn save(&self, path: &Path) -> Result<(), RecordingError> {
        let lines: Vec<String> = self
            .frames
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<_, _>>()
            .map_err(|e| RecordingError::SerializeError(e.to_string()))?;
        std::fs::write(path, lines.join("\n")).map_err(|e| RecordingError::IoError(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into a frame source and a matching detector.
    ///
    /// With `realtime`, the source sleeps between frames according to the
    /// recorded timestamps.
    pub fn into_replay(self, realtime: bool) -> (ReplaySource, ReplayDetector) {
        let mut frames = VecDeque::with_capacity(self.frames.len());
        let mut detections = HashMap::with_capacity(self.frames.len());

        for (seq, recorded) in self.frames.into_iter().enumerate() {
            let seq = seq as u64;
            let captured_at =
                DateTime::<Utc>::from_timestamp_millis(recorded.timestamp_ms).unwrap_or_default();
            frames.push_back(VideoFrame::new(
                seq,
                captured_at,
                recorded.width,
                recorded.height,
            ));

            let detection = match recorded.error {
                Some(e) => Err(DetectionError::Failed(e)),
                None if recorded.landmarks.is_empty() => Ok(None),
                None => Ok(Some(DetectedPose::new(recorded.landmarks, recorded.space))),
            };
            detections.insert(seq, detection);
        }

        (
            ReplaySource {
                frames,
                realtime,
                last_captured_at: None,
            },
            ReplayDetector { detections },
        )
    }
}

/// Frame source replaying recorded frame timestamps.
pub struct ReplaySource {
    frames: VecDeque<VideoFrame>,
    realtime: bool,
    last_captured_at: Option<DateTime<Utc>>,
}

impl ReplaySource {
    /// Frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        let frame = self.frames.pop_front()?;

        if self.realtime {
            if let Some(last) = self.last_captured_at {
                let gap = (frame.captured_at - last).num_milliseconds().max(0) as u64;
                tokio::time::sleep(Duration::from_millis(gap)).await;
            }
        }
        self.last_captured_at = Some(frame.captured_at);

        Some(frame)
    }
}

/// Detector answering from recorded landmarks.
pub struct ReplayDetector {
    detections: HashMap<u64, Result<Option<DetectedPose>, DetectionError>>,
}

impl PoseDetector for ReplayDetector {
    async fn detect(&mut self, frame: &VideoFrame) -> Result<Option<DetectedPose>, DetectionError> {
        self.detections
            .remove(&frame.sequence)
            .unwrap_or(Err(DetectionError::FrameUnavailable(frame.sequence)))
    }
}

/// Errors loading or writing recordings.
#[derive(Debug)]
pub enum RecordingError {
    IoError(String),
    ParseError { line: usize, message: String },
    SerializeError(String),
    Empty,
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::IoError(e) => write!(f, "IO error: {e}"),
            RecordingError::ParseError { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
            RecordingError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            RecordingError::Empty => write!(f, "Recording contains no frames"),
        }
    }
}

impl std::error::Error for RecordingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::LandmarkName;

    const SAMPLE: &str = r#"
{"timestamp_ms":1000,"width":640,"height":480,"landmarks":[{"name":"left_shoulder","x":100.0,"y":200.0,"confidence":0.9}]}

{"timestamp_ms":1033,"width":640,"height":480,"landmarks":[]}
{"timestamp_ms":1066,"width":640,"height":480,"error":"model timeout"}
"#;

    #[test]
    fn test_parse_skips_blank_lines() {
        let recording = Recording::parse(SAMPLE).unwrap();
        assert_eq!(recording.len(), 3);
        assert_eq!(recording.frames[0].space, CoordinateSpace::Pixels);
        assert_eq!(
            recording.frames[0].landmarks[0].name,
            LandmarkName::LeftShoulder
        );
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = Recording::parse("{\"timestamp_ms\":1,\"width\":1,\"height\":1}\nnot json").unwrap_err();
        match err {
            RecordingError::ParseError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_recording_rejected() {
        assert!(matches!(Recording::parse("\n\n"), Err(RecordingError::Empty)));
    }

    #[tokio::test]
    async fn test_replay_outcomes() {
        let (mut source, mut detector) = Recording::parse(SAMPLE).unwrap().into_replay(false);
        assert_eq!(source.remaining(), 3);

        let first = source.next_frame().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(first.captured_at.timestamp_millis(), 1000);
        let pose = detector.detect(&first).await.unwrap().unwrap();
        assert_eq!(pose.landmarks.len(), 1);

        let second = source.next_frame().await.unwrap();
        assert!(detector.detect(&second).await.unwrap().is_none());

        let third = source.next_frame().await.unwrap();
        assert_eq!(
            detector.detect(&third).await.unwrap_err(),
            DetectionError::Failed("model timeout".to_string())
        );

        assert!(source.next_frame().await.is_none());
        // Each frame is answered once
        assert!(matches!(
            detector.detect(&first).await,
            Err(DetectionError::FrameUnavailable(0))
        ));
    }
}
