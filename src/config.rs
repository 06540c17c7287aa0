//! Session configuration
//!
//! Calibration constants are policy rather than algorithm, so they live here
//! instead of as literals in the evaluator. All fields have defaults and a
//! partial JSON document fills in the rest.

use serde::{Deserialize, Serialize};

use crate::error::LivenessError;
use crate::types::CHALLENGE_POOL;

/// Default eye aspect ratio below which an eye counts as closed
pub const DEFAULT_BLINK_THRESHOLD: f64 = 0.25;
/// Default consecutive closed frames needed before a reopen counts as a blink
pub const DEFAULT_BLINK_MIN_CLOSED_FRAMES: u32 = 2;
/// Default yaw ratio below which the head counts as turned right
pub const DEFAULT_YAW_RIGHT_RATIO: f64 = 0.6;
/// Default yaw ratio above which the head counts as turned left
pub const DEFAULT_YAW_LEFT_RATIO: f64 = 1.6;
/// Default mouth-to-face width ratio above which a smile is detected
pub const DEFAULT_SMILE_RATIO: f64 = 0.45;
/// Default time allowed per challenge
pub const DEFAULT_CHALLENGE_TIMEOUT_MS: u64 = 10_000;
/// Default pause between a verified action and the next challenge
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
/// Upper bound for any configured timeout or delay (one day)
pub const MAX_PHASE_MS: u64 = 86_400_000;
/// Default number of distinct actions a session must complete
pub const DEFAULT_REQUIRED_ACTIONS: usize = 2;

/// Landmark indices of the detector's face topology.
///
/// Defaults follow the MediaPipe Face Mesh (468/478 point) convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    /// Left corner, upper lid x2, right corner, lower lid x2
    pub left_eye: [usize; 6],
    pub right_eye: [usize; 6],
    pub nose_tip: usize,
    pub left_cheek: usize,
    pub right_cheek: usize,
    pub mouth_left: usize,
    pub mouth_right: usize,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_eye: [33, 160, 158, 133, 153, 144],
            right_eye: [362, 385, 387, 263, 373, 380],
            nose_tip: 1,
            left_cheek: 234,
            right_cheek: 454,
            mouth_left: 61,
            mouth_right: 291,
        }
    }
}

impl LandmarkLayout {
    /// Highest landmark index the layout reads
    pub fn max_index(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .copied()
            .chain([
                self.nose_tip,
                self.left_cheek,
                self.right_cheek,
                self.mouth_left,
                self.mouth_right,
            ])
            .max()
            .unwrap_or(0)
    }

    /// Minimum landmark count a frame must carry
    pub fn required_len(&self) -> usize {
        self.max_index() + 1
    }
}

/// What to do when the detector reports more than one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiFacePolicy {
    /// Skip the frame; it only advances the clock
    #[default]
    Reject,
    /// Evaluate the first reported face and ignore the rest
    FirstFace,
}

/// Thresholds and timing for a liveness session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Average eye aspect ratio below which the eyes are closed
    pub blink_threshold: f64,
    /// Closed frames required before reopening registers a blink
    pub blink_min_closed_frames: u32,
    /// Yaw ratio below this is a right turn (mirrored capture)
    pub yaw_right_ratio: f64,
    /// Yaw ratio above this is a left turn (mirrored capture)
    pub yaw_left_ratio: f64,
    /// Mouth-to-face width ratio above this is a smile
    pub smile_ratio: f64,
    /// Time allowed for each challenge
    pub challenge_timeout_ms: u64,
    /// Pause between a verified action and the next challenge
    pub settle_delay_ms: u64,
    /// Distinct actions required for success
    pub required_actions: usize,
    pub multi_face_policy: MultiFacePolicy,
    pub layout: LandmarkLayout,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            blink_threshold: DEFAULT_BLINK_THRESHOLD,
            blink_min_closed_frames: DEFAULT_BLINK_MIN_CLOSED_FRAMES,
            yaw_right_ratio: DEFAULT_YAW_RIGHT_RATIO,
            yaw_left_ratio: DEFAULT_YAW_LEFT_RATIO,
            smile_ratio: DEFAULT_SMILE_RATIO,
            challenge_timeout_ms: DEFAULT_CHALLENGE_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            required_actions: DEFAULT_REQUIRED_ACTIONS,
            multi_face_policy: MultiFacePolicy::default(),
            layout: LandmarkLayout::default(),
        }
    }
}

impl LivenessConfig {
    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, LivenessError> {
        let config: LivenessConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, LivenessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that thresholds are usable together
    pub fn validate(&self) -> Result<(), LivenessError> {
        if !(self.blink_threshold.is_finite() && self.blink_threshold > 0.0) {
            return Err(LivenessError::InvalidConfig(format!(
                "blink_threshold must be a positive number, got {}",
                self.blink_threshold
            )));
        }

        if self.blink_min_closed_frames == 0 {
            return Err(LivenessError::InvalidConfig(
                "blink_min_closed_frames must be at least 1".to_string(),
            ));
        }

        if !(self.yaw_right_ratio.is_finite()
            && self.yaw_left_ratio.is_finite()
            && self.yaw_right_ratio > 0.0
            && self.yaw_right_ratio < self.yaw_left_ratio)
        {
            return Err(LivenessError::InvalidConfig(format!(
                "yaw ratios must satisfy 0 < yaw_right_ratio < yaw_left_ratio, got {} and {}",
                self.yaw_right_ratio, self.yaw_left_ratio
            )));
        }

        if !(self.smile_ratio.is_finite() && self.smile_ratio > 0.0) {
            return Err(LivenessError::InvalidConfig(format!(
                "smile_ratio must be a positive number, got {}",
                self.smile_ratio
            )));
        }

        if self.challenge_timeout_ms == 0 {
            return Err(LivenessError::InvalidConfig(
                "challenge_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.challenge_timeout_ms > MAX_PHASE_MS || self.settle_delay_ms > MAX_PHASE_MS {
            return Err(LivenessError::InvalidConfig(format!(
                "challenge_timeout_ms and settle_delay_ms must not exceed {} ms, got {} and {}",
                MAX_PHASE_MS, self.challenge_timeout_ms, self.settle_delay_ms
            )));
        }

        if self.required_actions == 0 || self.required_actions > CHALLENGE_POOL.len() {
            return Err(LivenessError::InvalidConfig(format!(
                "required_actions must be between 1 and {}, got {}",
                CHALLENGE_POOL.len(),
                self.required_actions
            )));
        }

        Ok(())
    }
}
