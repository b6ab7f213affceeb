//! Posture geometry derived from selected landmarks.
//!
//! All measurements are in frame pixel space with y growing downwards, so
//! "straight up" from a point is the negative y direction.

use crate::core::selector::RequiredLandmarkSet;
use crate::pose::types::Point;
use serde::{Deserialize, Serialize};

/// Length of the upward reference vector used by [`inclination_angle`].
const VERTICAL_REFERENCE_PX: f64 = 100.0;

/// Height of the vertical guide drawn above the shoulder in overlays.
const OVERLAY_GUIDE_PX: f64 = 150.0;

/// Shoulder widths below this are clamped when normalizing head offset.
const MIN_SHOULDER_WIDTH_PX: f64 = 1.0;

/// How the forward-head ratio was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardHeadMethod {
    /// Horizontal ear-to-nose offset
    EarNose,
    /// Horizontal offset between ear midpoint and shoulder midpoint
    EarMidpoint,
    /// Not enough landmarks; ratio reported as 0
    None,
}

/// Per-frame geometric measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryResult {
    /// Distance between the shoulders in pixels
    pub shoulder_offset: f64,
    /// Neck inclination from vertical, whole degrees
    pub neck_inclination_deg: f64,
    /// Torso inclination from vertical, whole degrees
    pub torso_inclination_deg: f64,
    /// Head protrusion relative to shoulder width
    pub forward_head_ratio: f64,
    pub forward_head_method: ForwardHeadMethod,
}

/// Euclidean distance between two points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Angle in whole degrees between straight up from `p` and the vector `p -> q`.
///
/// A zero-length `p -> q` has no direction; it yields 0 instead of NaN.
pub fn inclination_angle(p: &Point, q: &Point) -> f64 {
    let (ux, uy) = (0.0, -VERTICAL_REFERENCE_PX);
    let (vx, vy) = (q.x - p.x, q.y - p.y);

    let norm = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        tracing::trace!(?p, ?q, "degenerate inclination vector");
        return 0.0;
    }

    let cos = ((ux * vx + uy * vy) / norm).clamp(-1.0, 1.0);
    let degrees = cos.acos().to_degrees().round();
    if degrees.is_finite() {
        degrees
    } else {
        0.0
    }
}

/// Compute the forward-head ratio and the method used.
pub fn forward_head_ratio(set: &RequiredLandmarkSet, shoulder_width: f64) -> (f64, ForwardHeadMethod) {
    let width = shoulder_width.max(MIN_SHOULDER_WIDTH_PX);

    if let Some(nose) = set.nose {
        let offset = (set.left_ear.x - nose.x).abs();
        return (offset / width, ForwardHeadMethod::EarNose);
    }

    if let Some(right_ear) = set.right_ear {
        let ear_mid = set.left_ear.midpoint(&right_ear);
        let shoulder_mid = set.left_shoulder.midpoint(&set.right_shoulder);
        let offset = (ear_mid.x - shoulder_mid.x).abs();
        return (offset / width, ForwardHeadMethod::EarMidpoint);
    }

    (0.0, ForwardHeadMethod::None)
}

/// Compute all measurements for a valid landmark set.
pub fn compute_geometry(set: &RequiredLandmarkSet) -> GeometryResult {
    let shoulder_offset = distance(&set.left_shoulder, &set.right_shoulder);
    let neck_inclination_deg = inclination_angle(&set.left_shoulder, &set.left_ear);
    let torso_inclination_deg = inclination_angle(&set.left_hip, &set.left_shoulder);
    let (forward_head_ratio, forward_head_method) = forward_head_ratio(set, shoulder_offset);

    GeometryResult {
        shoulder_offset,
        neck_inclination_deg,
        torso_inclination_deg,
        forward_head_ratio,
        forward_head_method,
    }
}

/// Points and segments for drawing the posture overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_ear: Point,
    pub left_hip: Point,
    pub shoulder_mid: Point,
    /// Midpoint of both ears, or the left ear alone
    pub ear_mid: Point,
    /// Midpoint of both hips, or the left hip alone
    pub hip_mid: Point,
    /// Top of the vertical guide above the left shoulder
    pub vertical_guide_top: Point,
}

impl OverlayGeometry {
    pub fn from_landmarks(set: &RequiredLandmarkSet) -> Self {
        let ear_mid = set
            .right_ear
            .map(|r| set.left_ear.midpoint(&r))
            .unwrap_or(set.left_ear);
        let hip_mid = set
            .right_hip
            .map(|r| set.left_hip.midpoint(&r))
            .unwrap_or(set.left_hip);

        Self {
            left_shoulder: set.left_shoulder,
            right_shoulder: set.right_shoulder,
            left_ear: set.left_ear,
            left_hip: set.left_hip,
            shoulder_mid: set.left_shoulder.midpoint(&set.right_shoulder),
            ear_mid,
            hip_mid,
            vertical_guide_top: Point::new(
                set.left_shoulder.x,
                set.left_shoulder.y - OVERLAY_GUIDE_PX,
            ),
        }
    }

    /// Line segments to draw: neck, torso, shoulder line and vertical guide.
    pub fn segments(&self) -> [(Point, Point); 4] {
        [
            (self.left_shoulder, self.left_ear),
            (self.left_hip, self.left_shoulder),
            (self.left_shoulder, self.right_shoulder),
            (self.left_shoulder, self.vertical_guide_top),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_set() -> RequiredLandmarkSet {
        RequiredLandmarkSet {
            left_shoulder: Point::new(100.0, 200.0),
            right_shoulder: Point::new(160.0, 200.0),
            left_ear: Point::new(90.0, 100.0),
            right_ear: None,
            nose: None,
            left_hip: Point::new(110.0, 300.0),
            right_hip: None,
        }
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_angle_degenerate_is_zero() {
        let p = Point::new(42.0, 17.0);
        assert_eq!(inclination_angle(&p, &p), 0.0);
    }

    #[test]
    fn test_angle_cardinal_directions() {
        let p = Point::new(0.0, 0.0);
        assert_eq!(inclination_angle(&p, &Point::new(0.0, -50.0)), 0.0);
        assert_eq!(inclination_angle(&p, &Point::new(50.0, 0.0)), 90.0);
        assert_eq!(inclination_angle(&p, &Point::new(-50.0, 0.0)), 90.0);
        assert_eq!(inclination_angle(&p, &Point::new(0.0, 50.0)), 180.0);
        assert_eq!(inclination_angle(&p, &Point::new(10.0, -10.0)), 45.0);
    }

    #[test]
    fn test_worked_example() {
        let geometry = compute_geometry(&example_set());
        assert_eq!(geometry.shoulder_offset, 60.0);
        assert_eq!(geometry.neck_inclination_deg, 6.0);
        assert_eq!(geometry.torso_inclination_deg, 6.0);
        assert_eq!(geometry.forward_head_ratio, 0.0);
        assert_eq!(geometry.forward_head_method, ForwardHeadMethod::None);
    }

    #[test]
    fn test_forward_head_ear_nose_preferred() {
        let mut set = example_set();
        set.nose = Some(Point::new(108.0, 110.0));
        set.right_ear = Some(Point::new(150.0, 100.0));
        let (ratio, method) = forward_head_ratio(&set, 60.0);
        assert_eq!(method, ForwardHeadMethod::EarNose);
        assert!((ratio - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_forward_head_ear_midpoint() {
        let mut set = example_set();
        set.right_ear = Some(Point::new(170.0, 100.0));
        // ear mid x = 130, shoulder mid x = 130
        let (ratio, method) = forward_head_ratio(&set, 60.0);
        assert_eq!(method, ForwardHeadMethod::EarMidpoint);
        assert_eq!(ratio, 0.0);

        set.right_ear = Some(Point::new(182.0, 100.0));
        let (ratio, _) = forward_head_ratio(&set, 60.0);
        assert!((ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_forward_head_narrow_shoulders_clamped() {
        let mut set = example_set();
        set.nose = Some(Point::new(92.0, 110.0));
        let (ratio, _) = forward_head_ratio(&set, 0.0);
        assert_eq!(ratio, 2.0);
    }

    #[test]
    fn test_overlay_falls_back_to_left_side() {
        let overlay = OverlayGeometry::from_landmarks(&example_set());
        assert_eq!(overlay.ear_mid, Point::new(90.0, 100.0));
        assert_eq!(overlay.hip_mid, Point::new(110.0, 300.0));
        assert_eq!(overlay.shoulder_mid, Point::new(130.0, 200.0));
        assert_eq!(overlay.vertical_guide_top, Point::new(100.0, 50.0));
        assert_eq!(overlay.segments().len(), 4);
    }
}
