//! Selection and validation of the landmarks used for posture analysis.

use crate::pose::types::{Landmark, LandmarkName, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Landmarks that must be present for a frame to be analyzed, in report order.
pub const MANDATORY_LANDMARKS: [LandmarkName; 4] = [
    LandmarkName::LeftShoulder,
    LandmarkName::RightShoulder,
    LandmarkName::LeftEar,
    LandmarkName::LeftHip,
];

/// The subset of landmarks the geometry needs, in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequiredLandmarkSet {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_ear: Point,
    pub right_ear: Option<Point>,
    pub nose: Option<Point>,
    pub left_hip: Point,
    pub right_hip: Option<Point>,
}

/// A frame that cannot be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidFrame {
    /// Mandatory landmarks that were absent or below confidence
    pub missing: Vec<LandmarkName>,
}

impl std::fmt::Display for InvalidFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(|n| n.as_str()).collect();
        write!(f, "Missing landmarks: {}", names.join(", "))
    }
}

impl std::error::Error for InvalidFrame {}

/// Select the required landmarks from a detector's output.
///
/// Landmarks at or below the confidence threshold, or with non-finite
/// coordinates, count as absent. When a
/// name occurs more than once the most confident entry wins.
pub fn select_landmarks(landmarks: &[Landmark]) -> Result<RequiredLandmarkSet, InvalidFrame> {
    let mut visible: HashMap<LandmarkName, &Landmark> = HashMap::new();
    for lm in landmarks.iter().filter(|lm| lm.is_visible()) {
        visible
            .entry(lm.name)
            .and_modify(|existing| {
                if lm.confidence > existing.confidence {
                    *existing = lm;
                }
            })
            .or_insert(lm);
    }

    let point = |name: LandmarkName| visible.get(&name).map(|lm| lm.point());

    let missing: Vec<LandmarkName> = MANDATORY_LANDMARKS
        .iter()
        .copied()
        .filter(|name| !visible.contains_key(name))
        .collect();

    match (
        point(LandmarkName::LeftShoulder),
        point(LandmarkName::RightShoulder),
        point(LandmarkName::LeftEar),
        point(LandmarkName::LeftHip),
    ) {
        (Some(left_shoulder), Some(right_shoulder), Some(left_ear), Some(left_hip)) => {
            Ok(RequiredLandmarkSet {
                left_shoulder,
                right_shoulder,
                left_ear,
                right_ear: point(LandmarkName::RightEar),
                nose: point(LandmarkName::Nose),
                left_hip,
                right_hip: point(LandmarkName::RightHip),
            })
        }
        _ => Err(InvalidFrame { missing }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_set() -> Vec<Landmark> {
        vec![
            Landmark::new(LandmarkName::LeftShoulder, 100.0, 200.0, 0.9),
            Landmark::new(LandmarkName::RightShoulder, 160.0, 200.0, 0.9),
            Landmark::new(LandmarkName::LeftEar, 90.0, 100.0, 0.9),
            Landmark::new(LandmarkName::LeftHip, 110.0, 300.0, 0.9),
        ]
    }

    #[test]
    fn test_mandatory_only_is_valid() {
        let set = select_landmarks(&full_set()).unwrap();
        assert_eq!(set.left_shoulder, Point::new(100.0, 200.0));
        assert!(set.nose.is_none());
        assert!(set.right_ear.is_none());
        assert!(set.right_hip.is_none());
    }

    #[test]
    fn test_each_missing_mandatory_invalidates() {
        for name in MANDATORY_LANDMARKS {
            let landmarks: Vec<Landmark> =
                full_set().into_iter().filter(|lm| lm.name != name).collect();
            let err = select_landmarks(&landmarks).unwrap_err();
            assert_eq!(err.missing, vec![name]);
        }
    }

    #[test]
    fn test_low_confidence_counts_as_missing() {
        let mut landmarks = full_set();
        landmarks[2].confidence = 0.5;
        let err = select_landmarks(&landmarks).unwrap_err();
        assert_eq!(err.missing, vec![LandmarkName::LeftEar]);
    }

    #[test]
    fn test_non_finite_coordinates_count_as_missing() {
        let mut landmarks = full_set();
        landmarks[0].x = f64::NAN;
        landmarks[3].y = f64::INFINITY;
        let err = select_landmarks(&landmarks).unwrap_err();
        assert_eq!(
            err.missing,
            vec![LandmarkName::LeftShoulder, LandmarkName::LeftHip]
        );
    }

    #[test]
    fn test_non_finite_duplicate_does_not_replace_valid() {
        let mut landmarks = full_set();
        landmarks.push(Landmark::new(LandmarkName::LeftEar, f64::NAN, 100.0, 0.99));
        let set = select_landmarks(&landmarks).unwrap();
        assert_eq!(set.left_ear, Point::new(90.0, 100.0));
    }

    #[test]
    fn test_optional_low_confidence_dropped() {
        let mut landmarks = full_set();
        landmarks.push(Landmark::new(LandmarkName::Nose, 95.0, 110.0, 0.3));
        let set = select_landmarks(&landmarks).unwrap();
        assert!(set.nose.is_none());
    }

    #[test]
    fn test_duplicate_prefers_higher_confidence() {
        let mut landmarks = full_set();
        landmarks.push(Landmark::new(LandmarkName::LeftEar, 50.0, 50.0, 0.99));
        let set = select_landmarks(&landmarks).unwrap();
        assert_eq!(set.left_ear, Point::new(50.0, 50.0));
    }

    #[test]
    fn test_empty_reports_all_missing_in_order() {
        let err = select_landmarks(&[]).unwrap_err();
        assert_eq!(err.missing, MANDATORY_LANDMARKS.to_vec());
        assert!(err.to_string().contains("left_shoulder"));
    }
}
