//! Synthetic face geometry for unit tests

use crate::config::LandmarkLayout;
use crate::types::{ActionKind, Landmark, LandmarkSet};

const LEFT_CHEEK_X: f64 = 0.2;
const RIGHT_CHEEK_X: f64 = 0.8;
const FACE_Y: f64 = 0.5;
const EYE_WIDTH: f64 = 0.1;

/// Build a face on the default layout whose extracted signals are exactly
/// `eye_openness` (both eyes), `yaw_ratio` and `mouth_ratio`.
pub fn synthetic_face(eye_openness: f64, yaw_ratio: f64, mouth_ratio: f64) -> LandmarkSet {
    let layout = LandmarkLayout::default();
    let mut face = LandmarkSet::new(vec![Landmark::default(); layout.required_len()]);

    place_eye(&mut face, &layout.left_eye, 0.30, eye_openness);
    place_eye(&mut face, &layout.right_eye, 0.60, eye_openness);

    face.set(layout.left_cheek, Landmark::new(LEFT_CHEEK_X, FACE_Y, 0.0));
    face.set(layout.right_cheek, Landmark::new(RIGHT_CHEEK_X, FACE_Y, 0.0));

    // left/right horizontal distances from the nose have ratio `yaw_ratio`
    let nose_x = (LEFT_CHEEK_X + RIGHT_CHEEK_X * yaw_ratio) / (1.0 + yaw_ratio);
    face.set(layout.nose_tip, Landmark::new(nose_x, FACE_Y, -0.05));

    let half_mouth = (RIGHT_CHEEK_X - LEFT_CHEEK_X) * mouth_ratio / 2.0;
    face.set(layout.mouth_left, Landmark::new(0.5 - half_mouth, 0.7, 0.0));
    face.set(layout.mouth_right, Landmark::new(0.5 + half_mouth, 0.7, 0.0));

    face
}

/// Centered, eyes open, neutral mouth
pub fn neutral_face() -> LandmarkSet {
    synthetic_face(0.30, 1.0, 0.33)
}

pub fn face_with_eyes(eye_openness: f64) -> LandmarkSet {
    synthetic_face(eye_openness, 1.0, 0.33)
}

pub fn face_with_yaw(yaw_ratio: f64) -> LandmarkSet {
    synthetic_face(0.30, yaw_ratio, 0.33)
}

pub fn smiling_face() -> LandmarkSet {
    synthetic_face(0.30, 1.0, 0.55)
}

fn place_eye(face: &mut LandmarkSet, eye: &[usize; 6], left_x: f64, openness: f64) {
    let y = 0.35;
    let right_x = left_x + EYE_WIDTH;
    let half_gap = openness * EYE_WIDTH / 2.0;

    face.set(eye[0], Landmark::new(left_x, y, 0.0));
    face.set(eye[1], Landmark::new(left_x + 0.03, y - half_gap, 0.0));
    face.set(eye[2], Landmark::new(left_x + 0.07, y - half_gap, 0.0));
    face.set(eye[3], Landmark::new(right_x, y, 0.0));
    face.set(eye[4], Landmark::new(left_x + 0.07, y + half_gap, 0.0));
    face.set(eye[5], Landmark::new(left_x + 0.03, y + half_gap, 0.0));
}

/// Frames that satisfy `action` when fed in order, one per frame
pub fn satisfying_frames(action: ActionKind) -> Vec<LandmarkSet> {
    match action {
        ActionKind::Blink => vec![face_with_eyes(0.15), face_with_eyes(0.12), face_with_eyes(0.30)],
        ActionKind::TurnLeft => vec![face_with_yaw(2.0)],
        ActionKind::TurnRight => vec![face_with_yaw(0.5)],
        ActionKind::Smile => vec![smiling_face()],
    }
}
