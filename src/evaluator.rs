//! Per-frame challenge evaluation
//!
//! Blinks need hysteresis: the eyes must stay below the threshold for a
//! minimum number of consecutive frames and then reopen. A single dark frame
//! is noise, and eyes that stay low (looking down) never count. Head turns and
//! smiles are judged on the current frame alone.

use tracing::trace;

use crate::config::LivenessConfig;
use crate::features::{
    average_eye_openness, classify_yaw, head_yaw_ratio, is_smiling, mouth_width_ratio,
};
use crate::types::{ActionKind, HeadYaw, LandmarkSet};

/// Blink hysteresis over a stream of eye-openness samples
#[derive(Debug, Clone, Default)]
pub struct BlinkTracker {
    low_frames: u32,
}

impl BlinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive frames currently below the threshold
    pub fn low_frames(&self) -> u32 {
        self.low_frames
    }

    pub fn reset(&mut self) {
        self.low_frames = 0;
    }

    /// Feed one sample; true when it completes a blink
    pub fn observe(&mut self, eye_openness: f64, threshold: f64, min_closed_frames: u32) -> bool {
        if eye_openness < threshold {
            self.low_frames = self.low_frames.saturating_add(1);
            return false;
        }

        let blinked = self.low_frames >= min_closed_frames;
        self.low_frames = 0;
        blinked
    }
}

/// Decides whether the active challenge is satisfied on a frame
#[derive(Debug, Clone, Default)]
pub struct FrameEvaluator {
    blink: BlinkTracker,
}

impl FrameEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blink_low_frames(&self) -> u32 {
        self.blink.low_frames()
    }

    /// Clear per-challenge state when a new challenge is issued
    pub fn reset(&mut self) {
        self.blink.reset();
    }

    pub fn evaluate(
        &mut self,
        action: ActionKind,
        face: &LandmarkSet,
        config: &LivenessConfig,
    ) -> bool {
        let layout = &config.layout;

        match action {
            ActionKind::Blink => {
                let openness = average_eye_openness(face, layout);
                let blinked = self.blink.observe(
                    openness,
                    config.blink_threshold,
                    config.blink_min_closed_frames,
                );
                trace!(openness, low_frames = self.blink.low_frames(), blinked, "blink sample");
                blinked
            }
            ActionKind::TurnLeft | ActionKind::TurnRight => {
                let ratio = head_yaw_ratio(face, layout);
                let yaw = classify_yaw(ratio, config.yaw_right_ratio, config.yaw_left_ratio);
                trace!(ratio, ?yaw, "yaw sample");

                let wanted = if action == ActionKind::TurnLeft {
                    HeadYaw::Left
                } else {
                    HeadYaw::Right
                };
                yaw == wanted
            }
            ActionKind::Smile => {
                let ratio = mouth_width_ratio(face, layout);
                trace!(ratio, "mouth sample");
                is_smiling(ratio, config.smile_ratio)
            }
        }
    }
}
