//! Geometric feature extraction
//!
//! Pure functions that reduce one face's landmarks to scalar signals:
//! - Eye aspect ratio (eye openness)
//! - Head yaw ratio and its left/right/center classification
//! - Mouth width relative to face width
//!
//! Degenerate geometry (zero-length denominators) and missing landmark indices
//! return a neutral value instead of failing, so one bad frame cannot crash or
//! fail a session.

use serde::{Deserialize, Serialize};

use crate::config::{LandmarkLayout, LivenessConfig};
use crate::types::{HeadYaw, LandmarkSet};

/// Yaw ratio reported when the geometry cannot be measured
pub const NEUTRAL_YAW_RATIO: f64 = 1.0;

/// Eye aspect ratio for one eye.
///
/// `eye` holds the left corner, two upper lid points, the right corner and two
/// lower lid points. The ratio is the sum of both lid gaps over twice the
/// corner-to-corner width, and shrinks sharply when the eye closes.
pub fn eye_openness(landmarks: &LandmarkSet, eye: &[usize; 6]) -> f64 {
    let points = (
        landmarks.get(eye[0]),
        landmarks.get(eye[1]),
        landmarks.get(eye[2]),
        landmarks.get(eye[3]),
        landmarks.get(eye[4]),
        landmarks.get(eye[5]),
    );

    match points {
        (Some(p1), Some(p2), Some(p3), Some(p4), Some(p5), Some(p6)) => {
            let vertical_1 = p2.distance(p6);
            let vertical_2 = p3.distance(p5);
            let horizontal = p1.distance(p4);

            if horizontal == 0.0 {
                return 0.0;
            }
            (vertical_1 + vertical_2) / (2.0 * horizontal)
        }
        _ => 0.0,
    }
}

/// Mean eye aspect ratio over both eyes
pub fn average_eye_openness(landmarks: &LandmarkSet, layout: &LandmarkLayout) -> f64 {
    let left = eye_openness(landmarks, &layout.left_eye);
    let right = eye_openness(landmarks, &layout.right_eye);
    (left + right) / 2.0
}

/// Horizontal nose-to-left-cheek distance over nose-to-right-cheek distance.
///
/// Returns [`NEUTRAL_YAW_RATIO`] when either distance is zero or a landmark is
/// missing.
pub fn head_yaw_ratio(landmarks: &LandmarkSet, layout: &LandmarkLayout) -> f64 {
    let (nose, left_cheek, right_cheek) = match (
        landmarks.get(layout.nose_tip),
        landmarks.get(layout.left_cheek),
        landmarks.get(layout.right_cheek),
    ) {
        (Some(n), Some(l), Some(r)) => (n, l, r),
        _ => return NEUTRAL_YAW_RATIO,
    };

    let to_left = nose.horizontal_distance(left_cheek);
    let to_right = nose.horizontal_distance(right_cheek);

    if to_left == 0.0 || to_right == 0.0 {
        return NEUTRAL_YAW_RATIO;
    }
    to_left / to_right
}

/// Classify a yaw ratio for a horizontally mirrored (selfie) capture.
///
/// Turning to the subject's left moves the nose toward the right cheek on
/// screen, so the ratio grows; turning right shrinks it. Both boundaries
/// belong to `Center`.
pub fn classify_yaw(ratio: f64, right_below: f64, left_above: f64) -> HeadYaw {
    if ratio < right_below {
        HeadYaw::Right
    } else if ratio > left_above {
        HeadYaw::Left
    } else {
        HeadYaw::Center
    }
}

/// Mouth-corner width over cheek-to-cheek face width
pub fn mouth_width_ratio(landmarks: &LandmarkSet, layout: &LandmarkLayout) -> f64 {
    match (
        landmarks.get(layout.mouth_left),
        landmarks.get(layout.mouth_right),
        landmarks.get(layout.left_cheek),
        landmarks.get(layout.right_cheek),
    ) {
        (Some(mouth_left), Some(mouth_right), Some(left_cheek), Some(right_cheek)) => {
            let face_width = left_cheek.distance(right_cheek);
            if face_width == 0.0 {
                return 0.0;
            }
            mouth_left.distance(mouth_right) / face_width
        }
        _ => 0.0,
    }
}

pub fn is_smiling(mouth_ratio: f64, threshold: f64) -> bool {
    mouth_ratio > threshold
}

/// All signals for one face, for diagnostics and tracing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceFeatures {
    pub eye_openness: f64,
    pub eyes_closed: bool,
    pub yaw_ratio: f64,
    pub yaw: HeadYaw,
    pub mouth_width_ratio: f64,
    pub smiling: bool,
}

impl FaceFeatures {
    /// Extract every signal using the configured layout and thresholds
    pub fn extract(landmarks: &LandmarkSet, config: &LivenessConfig) -> Self {
        let eye_openness = average_eye_openness(landmarks, &config.layout);
        let yaw_ratio = head_yaw_ratio(landmarks, &config.layout);
        let mouth_width_ratio = mouth_width_ratio(landmarks, &config.layout);

        Self {
            eye_openness,
            eyes_closed: eye_openness < config.blink_threshold,
            yaw_ratio,
            yaw: classify_yaw(yaw_ratio, config.yaw_right_ratio, config.yaw_left_ratio),
            mouth_width_ratio,
            smiling: is_smiling(mouth_width_ratio, config.smile_ratio),
        }
    }
}
