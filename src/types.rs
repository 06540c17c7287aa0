//! Core types for the liveness engine
//!
//! This module defines the data that flows through a liveness session:
//! landmark input, challenge actions, session status, and the read-only
//! views handed to presentation layers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single facial landmark in normalized image space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in all three axes
    pub fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Absolute distance along the image x axis
    pub fn horizontal_distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).abs()
    }
}

/// Landmarks for one detected face, ordered by the detector's index convention
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Landmark>);

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Landmark at a detector index, if the set is long enough
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.0.get(index)
    }

    /// Overwrite one landmark; out-of-range indices are ignored
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = landmark;
        }
    }

    pub fn points(&self) -> &[Landmark] {
        &self.0
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self(points)
    }
}

/// Facial action a subject can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Blink,
    TurnLeft,
    TurnRight,
    Smile,
}

/// The fixed pool challenges are drawn from
pub const CHALLENGE_POOL: [ActionKind; 4] = [
    ActionKind::Blink,
    ActionKind::TurnLeft,
    ActionKind::TurnRight,
    ActionKind::Smile,
];

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Blink => "blink",
            ActionKind::TurnLeft => "turn-left",
            ActionKind::TurnRight => "turn-right",
            ActionKind::Smile => "smile",
        }
    }

    /// Instruction shown to the subject while this action is active
    pub fn prompt(&self) -> &'static str {
        match self {
            ActionKind::Blink => "Blink your eyes",
            ActionKind::TurnLeft => "Turn your head Left",
            ActionKind::TurnRight => "Turn your head Right",
            ActionKind::Smile => "Smile!",
        }
    }
}

/// Head yaw classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadYaw {
    Left,
    Right,
    Center,
}

/// Why a session ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The active challenge was not satisfied before its deadline
    Timeout,
    /// The capture collaborator reported that camera access was refused
    CameraDenied,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::CameraDenied => "camera_denied",
        }
    }
}

/// Flat session status as seen by readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Challenge,
    Verifying,
    Success,
    Failure,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Success | SessionStatus::Failure | SessionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Challenge => "challenge",
            SessionStatus::Verifying => "verifying",
            SessionStatus::Success => "success",
            SessionStatus::Failure => "failure",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of feeding one input (frame or tick) into a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Session not started, or already terminal
    Ignored,
    /// Waiting for the first frame with a face
    AwaitingFace,
    /// No face in frame; only the clock advanced
    NoFace,
    /// More than one face in frame and the policy rejects ambiguous frames
    AmbiguousFaces(usize),
    /// A new challenge became active
    ChallengeIssued(ActionKind),
    /// The active challenge is not satisfied yet
    Pending(ActionKind),
    /// The active challenge was just satisfied
    ActionVerified(ActionKind),
    /// Waiting out the pause between challenges
    Settling,
    /// The session reached a terminal status on this input
    Finished(SessionStatus),
}

/// Emitted exactly once, when a session reaches a terminal status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub session_id: Uuid,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    pub completed_actions: Vec<ActionKind>,
    /// Time from `start()` to the terminal transition
    pub elapsed_ms: i64,
}

/// Read-only view of a session for presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_action: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Completed actions over required actions (0-1)
    pub progress_fraction: f64,
    pub completed_actions: Vec<ActionKind>,
    /// Milliseconds left on the active challenge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

/// Outcome of one input together with the state it left behind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    #[serde(flatten)]
    pub outcome: FrameOutcome,
    pub snapshot: SessionSnapshot,
}

/// Out-of-band signal recorded alongside frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEvent {
    CameraDenied,
    Cancel,
}

/// One recorded detector output, as consumed by the CLI and FFI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Milliseconds on the recording's timeline
    #[serde(default)]
    pub t_ms: Option<i64>,
    /// Every face the detector reported, primary first
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<CaptureEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_distances() {
        let a = Landmark::new(0.0, 0.0, 0.0);
        let b = Landmark::new(3.0, 4.0, 12.0);
        assert!((a.distance(&b) - 13.0).abs() < 1e-9);
        assert!((a.horizontal_distance(&b) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_action_kind_serialization() {
        let json = serde_json::to_string(&ActionKind::TurnLeft).unwrap();
        assert_eq!(json, "\"turn-left\"");

        let parsed: ActionKind = serde_json::from_str("\"smile\"").unwrap();
        assert_eq!(parsed, ActionKind::Smile);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Success.is_terminal());
        assert!(SessionStatus::Failure.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Initializing.is_terminal());
        assert!(!SessionStatus::Challenge.is_terminal());
        assert!(!SessionStatus::Verifying.is_terminal());
    }

    #[test]
    fn test_frame_record_parsing() {
        let json = r#"{
            "t_ms": 40,
            "faces": [[{"x": 0.1, "y": 0.2, "z": 0.0}, {"x": 0.3, "y": 0.4}]]
        }"#;
        let record: FrameRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.t_ms, Some(40));
        assert_eq!(record.faces.len(), 1);
        assert_eq!(record.faces[0].len(), 2);
        assert_eq!(record.faces[0].get(1), Some(&Landmark::new(0.3, 0.4, 0.0)));
        assert!(record.event.is_none());
    }

    #[test]
    fn test_frame_record_event_only() {
        let record: FrameRecord = serde_json::from_str(r#"{"event": "camera_denied"}"#).unwrap();
        assert_eq!(record.event, Some(CaptureEvent::CameraDenied));
        assert!(record.faces.is_empty());
    }

    #[test]
    fn test_landmark_set_out_of_range_set_is_ignored() {
        let mut set = LandmarkSet::new(vec![Landmark::default(); 2]);
        set.set(5, Landmark::new(1.0, 1.0, 1.0));
        assert_eq!(set.len(), 2);
        assert!(set.get(5).is_none());
    }
}
