//! Threshold-based posture classification.

use crate::core::geometry::GeometryResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// External configuration keys for each threshold.
pub const NECK_ANGLE_KEY: &str = "neck_angle_threshold";
pub const TORSO_ANGLE_KEY: &str = "torso_angle_threshold";
pub const ALIGNMENT_KEY: &str = "alignment_threshold";
pub const FORWARD_HEAD_KEY: &str = "forward_head_threshold";

/// Classification thresholds.
///
/// Keys missing from serialized input take their default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Neck inclination must stay below this (degrees)
    #[serde(rename = "neck_angle_threshold")]
    pub neck_angle_deg: f64,
    /// Torso inclination must stay below this (degrees)
    #[serde(rename = "torso_angle_threshold")]
    pub torso_angle_deg: f64,
    /// Shoulder offset below this counts as aligned (pixels)
    #[serde(rename = "alignment_threshold")]
    pub alignment_px: f64,
    /// Forward-head ratio above this counts as forward head
    #[serde(rename = "forward_head_threshold")]
    pub forward_head_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            neck_angle_deg: 35.0,
            torso_angle_deg: 10.0,
            alignment_px: 30.0,
            forward_head_ratio: 0.2,
        }
    }
}

impl Thresholds {
    /// Apply values keyed by their external names on top of `self`.
    ///
    /// Unknown keys are ignored. Missing keys keep the current value.
    /// Non-positive or non-finite values are rejected and reported back.
    pub fn merge_named(&self, values: &HashMap<String, f64>) -> (Thresholds, Vec<String>) {
        let mut merged = *self;
        let mut rejected = Vec::new();

        let fields: [(&str, &mut f64); 4] = [
            (NECK_ANGLE_KEY, &mut merged.neck_angle_deg),
            (TORSO_ANGLE_KEY, &mut merged.torso_angle_deg),
            (ALIGNMENT_KEY, &mut merged.alignment_px),
            (FORWARD_HEAD_KEY, &mut merged.forward_head_ratio),
        ];

        for (key, slot) in fields {
            if let Some(&value) = values.get(key) {
                if value.is_finite() && value > 0.0 {
                    *slot = value;
                } else {
                    rejected.push(key.to_string());
                }
            }
        }

        (merged, rejected)
    }

    /// Replace invalid values with defaults, returning the keys that were fixed.
    pub fn sanitized(&self) -> (Thresholds, Vec<String>) {
        let named: HashMap<String, f64> = self.to_named().into_iter().collect();
        Thresholds::default().merge_named(&named)
    }

    /// Values keyed by their external names.
    pub fn to_named(&self) -> Vec<(String, f64)> {
        vec![
            (NECK_ANGLE_KEY.to_string(), self.neck_angle_deg),
            (TORSO_ANGLE_KEY.to_string(), self.torso_angle_deg),
            (ALIGNMENT_KEY.to_string(), self.alignment_px),
            (FORWARD_HEAD_KEY.to_string(), self.forward_head_ratio),
        ]
    }
}

/// Result of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_good_posture: bool,
    /// Diagnostic only; does not affect `is_good_posture`
    pub is_aligned: bool,
    pub is_forward_head: bool,
    pub geometry: GeometryResult,
}

impl ClassificationResult {
    pub fn is_neck_good(&self, thresholds: &Thresholds) -> bool {
        self.geometry.neck_inclination_deg < thresholds.neck_angle_deg
    }

    pub fn is_torso_good(&self, thresholds: &Thresholds) -> bool {
        self.geometry.torso_inclination_deg < thresholds.torso_angle_deg
    }
}

/// Classify a frame's geometry.
pub fn classify(geometry: &GeometryResult, thresholds: &Thresholds) -> ClassificationResult {
    let is_aligned = geometry.shoulder_offset < thresholds.alignment_px;
    let is_forward_head = geometry.forward_head_ratio > thresholds.forward_head_ratio;
    let is_good_posture = geometry.neck_inclination_deg < thresholds.neck_angle_deg
        && geometry.torso_inclination_deg < thresholds.torso_angle_deg
        && !is_forward_head;

    ClassificationResult {
        is_good_posture,
        is_aligned,
        is_forward_head,
        geometry: *geometry,
    }
}

/// Overlay color convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureColor {
    Green,
    Red,
}

impl PostureColor {
    pub fn for_posture(is_good: bool) -> Self {
        if is_good {
            PostureColor::Green
        } else {
            PostureColor::Red
        }
    }
}

/// Human-readable status per metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureAssessment {
    /// "Good" or "Poor"
    pub neck: String,
    /// "Good" or "Poor"
    pub torso: String,
    /// "Aligned" or "Misaligned"
    pub alignment: String,
    /// "Good" or "Forward"
    pub forward_head: String,
    /// "Good" or "Needs improvement"
    pub overall: String,
}

impl PostureAssessment {
    pub fn new(result: &ClassificationResult, thresholds: &Thresholds) -> Self {
        let label = |ok: bool, good: &str, bad: &str| {
            if ok {
                good.to_string()
            } else {
                bad.to_string()
            }
        };

        Self {
            neck: label(result.is_neck_good(thresholds), "Good", "Poor"),
            torso: label(result.is_torso_good(thresholds), "Good", "Poor"),
            alignment: label(result.is_aligned, "Aligned", "Misaligned"),
            forward_head: label(!result.is_forward_head, "Good", "Forward"),
            overall: label(result.is_good_posture, "Good", "Needs improvement"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::ForwardHeadMethod;

    fn geometry(neck: f64, torso: f64, offset: f64, ratio: f64) -> GeometryResult {
        GeometryResult {
            shoulder_offset: offset,
            neck_inclination_deg: neck,
            torso_inclination_deg: torso,
            forward_head_ratio: ratio,
            forward_head_method: ForwardHeadMethod::EarNose,
        }
    }

    #[test]
    fn test_good_posture() {
        let result = classify(&geometry(6.0, 6.0, 60.0, 0.0), &Thresholds::default());
        assert!(result.is_good_posture);
        assert!(!result.is_forward_head);
        assert!(!result.is_aligned);
    }

    #[test]
    fn test_alignment_does_not_gate_posture() {
        let thresholds = Thresholds::default();
        let misaligned = classify(&geometry(5.0, 5.0, 500.0, 0.1), &thresholds);
        assert!(!misaligned.is_aligned);
        assert!(misaligned.is_good_posture);

        let aligned = classify(&geometry(50.0, 5.0, 5.0, 0.1), &thresholds);
        assert!(aligned.is_aligned);
        assert!(!aligned.is_good_posture);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let thresholds = Thresholds::default();
        assert!(!classify(&geometry(35.0, 5.0, 10.0, 0.0), &thresholds).is_good_posture);
        assert!(!classify(&geometry(5.0, 10.0, 10.0, 0.0), &thresholds).is_good_posture);
        // Ratio equal to threshold is not forward
        let at_limit = classify(&geometry(5.0, 5.0, 10.0, 0.2), &thresholds);
        assert!(!at_limit.is_forward_head);
        assert!(at_limit.is_good_posture);
        assert!(classify(&geometry(5.0, 5.0, 10.0, 0.21), &thresholds).is_forward_head);
    }

    #[test]
    fn test_merge_named() {
        let mut values = HashMap::new();
        values.insert(NECK_ANGLE_KEY.to_string(), 40.0);
        values.insert(ALIGNMENT_KEY.to_string(), -1.0);
        values.insert("unrelated".to_string(), 1.0);

        let (merged, rejected) = Thresholds::default().merge_named(&values);
        assert_eq!(merged.neck_angle_deg, 40.0);
        assert_eq!(merged.alignment_px, 30.0);
        assert_eq!(merged.forward_head_ratio, 0.2);
        assert_eq!(rejected, vec![ALIGNMENT_KEY.to_string()]);
    }

    #[test]
    fn test_missing_forward_head_defaults() {
        let json = r#"{"neck_angle_threshold":30,"torso_angle_threshold":8,"alignment_threshold":25}"#;
        let thresholds: Thresholds = serde_json::from_str(json).unwrap();
        assert_eq!(thresholds.neck_angle_deg, 30.0);
        assert_eq!(thresholds.forward_head_ratio, 0.2);
    }

    #[test]
    fn test_each_missing_key_defaults() {
        let thresholds: Thresholds =
            serde_json::from_str(r#"{"torso_angle_threshold":12}"#).unwrap();
        assert_eq!(thresholds.neck_angle_deg, 35.0);
        assert_eq!(thresholds.torso_angle_deg, 12.0);
        assert_eq!(thresholds.alignment_px, 30.0);
        assert_eq!(thresholds.forward_head_ratio, 0.2);

        let empty: Thresholds = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Thresholds::default());
    }

    #[test]
    fn test_sanitized_replaces_invalid() {
        let broken = Thresholds {
            torso_angle_deg: f64::NAN,
            ..Default::default()
        };
        let (fixed, rejected) = broken.sanitized();
        assert_eq!(fixed.torso_angle_deg, 10.0);
        assert_eq!(rejected, vec![TORSO_ANGLE_KEY.to_string()]);
    }

    #[test]
    fn test_assessment_labels() {
        let thresholds = Thresholds::default();
        let result = classify(&geometry(40.0, 5.0, 10.0, 0.5), &thresholds);
        let assessment = PostureAssessment::new(&result, &thresholds);
        assert_eq!(assessment.neck, "Poor");
        assert_eq!(assessment.torso, "Good");
        assert_eq!(assessment.alignment, "Aligned");
        assert_eq!(assessment.forward_head, "Forward");
        assert_eq!(assessment.overall, "Needs improvement");
        assert_eq!(PostureColor::for_posture(false), PostureColor::Red);
    }
}
