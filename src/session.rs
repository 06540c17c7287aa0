//! Liveness session state machine
//!
//! A session walks `Initializing -> Challenge -> Verifying -> ... -> Success`,
//! or stops early in `Failure` or `Cancelled`. Time is passed in by the caller
//! on every input, so the machine itself never reads a clock.
//!
//! Only [`crate::controller::SessionController`] mutates a session; everything
//! public here is a read accessor.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::LivenessConfig;
use crate::evaluator::FrameEvaluator;
use crate::selector::{ChallengeSelector, Selection};
use crate::types::{ActionKind, FailureReason, FrameOutcome, LandmarkSet, SessionStatus};

/// Full session state. The active action and its deadline exist only inside
/// `Challenge`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Initializing,
    Challenge {
        action: ActionKind,
        deadline: DateTime<Utc>,
    },
    /// Pause after a verified action before the next challenge
    Verifying { settle_until: DateTime<Utc> },
    Success,
    Failure(FailureReason),
    Cancelled,
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Initializing => SessionStatus::Initializing,
            SessionState::Challenge { .. } => SessionStatus::Challenge,
            SessionState::Verifying { .. } => SessionStatus::Verifying,
            SessionState::Success => SessionStatus::Success,
            SessionState::Failure(_) => SessionStatus::Failure,
            SessionState::Cancelled => SessionStatus::Cancelled,
        }
    }
}

pub struct LivenessSession {
    config: LivenessConfig,
    state: SessionState,
    completed: Vec<ActionKind>,
    selector: ChallengeSelector,
    evaluator: FrameEvaluator,
}

impl LivenessSession {
    pub fn new(config: LivenessConfig, selector: ChallengeSelector) -> Self {
        Self {
            config,
            state: SessionState::Initializing,
            completed: Vec::new(),
            selector,
            evaluator: FrameEvaluator::new(),
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.state {
            SessionState::Failure(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn current_action(&self) -> Option<ActionKind> {
        match self.state {
            SessionState::Challenge { action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Challenge { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Time left on the active challenge, floored at zero
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline()
            .map(|deadline| (deadline - now).num_milliseconds().max(0))
    }

    /// Completed actions in the order they were performed
    pub fn completed_actions(&self) -> &[ActionKind] {
        &self.completed
    }

    pub fn progress_fraction(&self) -> f64 {
        let required = self.config.required_actions.max(1);
        (self.completed.len() as f64 / required as f64).min(1.0)
    }

    pub fn blink_low_frames(&self) -> u32 {
        self.evaluator.blink_low_frames()
    }

    /// Feed a frame with exactly one face
    pub(crate) fn observe_face(&mut self, face: &LandmarkSet, now: DateTime<Utc>) -> FrameOutcome {
        match self.state {
            SessionState::Initializing => {
                debug!("first face detected");
                self.advance(now)
            }
            SessionState::Challenge { action, deadline } => {
                if now > deadline {
                    return self.time_out(action);
                }

                if self.evaluator.evaluate(action, face, &self.config) {
                    self.verify(action, now)
                } else {
                    FrameOutcome::Pending(action)
                }
            }
            SessionState::Verifying { .. } => self.tick(now),
            _ => FrameOutcome::Ignored,
        }
    }

    /// Feed a frame without a usable face. Progress is kept; only time moves.
    pub(crate) fn observe_no_face(&mut self, now: DateTime<Utc>) -> FrameOutcome {
        match self.tick(now) {
            FrameOutcome::AwaitingFace | FrameOutcome::Pending(_) => FrameOutcome::NoFace,
            outcome => outcome,
        }
    }

    /// Apply time-driven transitions: challenge timeout and end of settle pause
    pub(crate) fn tick(&mut self, now: DateTime<Utc>) -> FrameOutcome {
        match self.state {
            SessionState::Initializing => FrameOutcome::AwaitingFace,
            SessionState::Challenge { action, deadline } => {
                if now > deadline {
                    self.time_out(action)
                } else {
                    FrameOutcome::Pending(action)
                }
            }
            SessionState::Verifying { settle_until } => {
                if now >= settle_until {
                    self.advance(now)
                } else {
                    FrameOutcome::Settling
                }
            }
            _ => FrameOutcome::Ignored,
        }
    }

    /// Move to `Cancelled`; false if already terminal
    pub(crate) fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        info!(completed = self.completed.len(), "liveness session cancelled");
        self.state = SessionState::Cancelled;
        true
    }

    /// Move to `Failure(reason)`; false if already terminal
    pub(crate) fn fail(&mut self, reason: FailureReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        info!(reason = reason.as_str(), "liveness session failed");
        self.state = SessionState::Failure(reason);
        true
    }

    fn verify(&mut self, action: ActionKind, now: DateTime<Utc>) -> FrameOutcome {
        if !self.completed.contains(&action) {
            self.completed.push(action);
        }
        debug!(
            action = action.as_str(),
            completed = self.completed.len(),
            required = self.config.required_actions,
            "challenge verified"
        );

        self.state = SessionState::Verifying {
            settle_until: later_by(now, self.config.settle_delay_ms),
        };
        FrameOutcome::ActionVerified(action)
    }

    fn time_out(&mut self, action: ActionKind) -> FrameOutcome {
        debug!(action = action.as_str(), "challenge deadline exceeded");
        self.fail(FailureReason::Timeout);
        FrameOutcome::Finished(SessionStatus::Failure)
    }

    /// Ask the selector for the next challenge, or finish
    fn advance(&mut self, now: DateTime<Utc>) -> FrameOutcome {
        match self.selector.pick_next(&self.completed) {
            Selection::Next(action) => {
                self.evaluator.reset();
                let deadline = later_by(now, self.config.challenge_timeout_ms);
                debug!(action = action.as_str(), %deadline, "challenge issued");
                self.state = SessionState::Challenge { action, deadline };
                FrameOutcome::ChallengeIssued(action)
            }
            Selection::Complete => {
                info!(actions = ?self.completed, "liveness verified");
                self.state = SessionState::Success;
                FrameOutcome::Finished(SessionStatus::Success)
            }
        }
    }
}

/// `now` plus `ms`, saturating at the latest representable instant
fn later_by(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{face_with_eyes, neutral_face, satisfying_frames};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn session() -> LivenessSession {
        LivenessSession::new(LivenessConfig::default(), ChallengeSelector::with_seed(2, 11))
    }

    /// Session with a challenge issued at t=0
    fn challenged() -> (LivenessSession, ActionKind) {
        let mut s = session();
        let outcome = s.observe_face(&neutral_face(), at(0));
        let action = match outcome {
            FrameOutcome::ChallengeIssued(action) => action,
            other => panic!("unexpected outcome {:?}", other),
        };
        (s, action)
    }

    /// Feed the frames that satisfy `action`, the last one at `end_ms`
    fn perform(s: &mut LivenessSession, action: ActionKind, end_ms: i64) -> FrameOutcome {
        let frames = satisfying_frames(action);
        let start = end_ms - frames.len() as i64 + 1;
        let mut last = FrameOutcome::Ignored;
        for (i, frame) in frames.iter().enumerate() {
            last = s.observe_face(frame, at(start + i as i64));
        }
        last
    }

    #[test]
    fn test_starts_initializing() {
        let s = session();
        assert_eq!(s.status(), SessionStatus::Initializing);
        assert_eq!(s.current_action(), None);
        assert_eq!(s.deadline(), None);
        assert_eq!(s.progress_fraction(), 0.0);
    }

    #[test]
    fn test_no_face_while_initializing_is_noop() {
        let mut s = session();
        assert_eq!(s.observe_no_face(at(50_000)), FrameOutcome::NoFace);
        assert_eq!(s.status(), SessionStatus::Initializing);
    }

    #[test]
    fn test_first_face_issues_challenge_with_deadline() {
        let (s, action) = challenged();
        assert_eq!(s.status(), SessionStatus::Challenge);
        assert_eq!(s.current_action(), Some(action));
        assert_eq!(s.deadline(), Some(at(10_000)));
        assert_eq!(s.remaining_ms(at(2_500)), Some(7_500));
    }

    #[test]
    fn test_verified_action_enters_verifying() {
        let (mut s, action) = challenged();
        assert_eq!(perform(&mut s, action, 500), FrameOutcome::ActionVerified(action));

        assert_eq!(s.status(), SessionStatus::Verifying);
        assert_eq!(s.current_action(), None);
        assert_eq!(s.completed_actions(), &[action]);
        assert_eq!(s.progress_fraction(), 0.5);
    }

    #[test]
    fn test_settle_delay_then_next_challenge() {
        let (mut s, first) = challenged();
        perform(&mut s, first, 500);

        assert_eq!(s.tick(at(1_499)), FrameOutcome::Settling);

        let second = match s.tick(at(1_500)) {
            FrameOutcome::ChallengeIssued(action) => action,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_ne!(second, first);
        assert_eq!(s.deadline(), Some(at(11_500)));
    }

    #[test]
    fn test_full_session_reaches_success() {
        let (mut s, first) = challenged();
        perform(&mut s, first, 500);
        let second = match s.tick(at(1_500)) {
            FrameOutcome::ChallengeIssued(action) => action,
            other => panic!("unexpected outcome {:?}", other),
        };
        perform(&mut s, second, 3_000);

        assert_eq!(s.tick(at(4_000)), FrameOutcome::Finished(SessionStatus::Success));
        assert_eq!(s.status(), SessionStatus::Success);
        assert_eq!(s.completed_actions(), &[first, second]);
        assert_eq!(s.progress_fraction(), 1.0);

        // terminal: later input changes nothing
        assert_eq!(s.observe_face(&neutral_face(), at(5_000)), FrameOutcome::Ignored);
        assert_eq!(s.tick(at(60_000)), FrameOutcome::Ignored);
        assert!(!s.cancel());
        assert_eq!(s.status(), SessionStatus::Success);
    }

    #[test]
    fn test_timeout_after_full_window() {
        let (mut s, action) = challenged();

        // exactly at the deadline the window has not been exceeded
        assert_eq!(s.tick(at(10_000)), FrameOutcome::Pending(action));
        assert_eq!(s.tick(at(10_001)), FrameOutcome::Finished(SessionStatus::Failure));
        assert_eq!(s.failure_reason(), Some(FailureReason::Timeout));
        assert_eq!(s.current_action(), None);
    }

    #[test]
    fn test_satisfied_just_before_deadline_does_not_time_out() {
        let (mut s, action) = challenged();
        assert_eq!(perform(&mut s, action, 9_999), FrameOutcome::ActionVerified(action));
        assert_eq!(s.tick(at(10_500)), FrameOutcome::Settling);
        assert_eq!(s.status(), SessionStatus::Verifying);
    }

    #[test]
    fn test_late_frame_times_out_before_evaluation() {
        let (mut s, action) = challenged();
        let frames = satisfying_frames(action);
        let last = frames.last().cloned().unwrap_or_else(neutral_face);

        assert_eq!(
            s.observe_face(&last, at(10_001)),
            FrameOutcome::Finished(SessionStatus::Failure)
        );
        assert!(s.completed_actions().is_empty());
    }

    #[test]
    fn test_face_loss_keeps_progress_but_counts_toward_timeout() {
        let (mut s, action) = challenged();
        if action == ActionKind::Blink {
            s.observe_face(&face_with_eyes(0.1), at(100));
            s.observe_face(&face_with_eyes(0.1), at(133));
        }

        assert_eq!(s.observe_no_face(at(5_000)), FrameOutcome::NoFace);
        assert_eq!(s.status(), SessionStatus::Challenge);
        assert_eq!(s.current_action(), Some(action));
        let expected_low = if action == ActionKind::Blink { 2 } else { 0 };
        assert_eq!(s.blink_low_frames(), expected_low);

        assert_eq!(
            s.observe_no_face(at(10_001)),
            FrameOutcome::Finished(SessionStatus::Failure)
        );
    }

    #[test]
    fn test_blink_counter_resets_on_new_challenge() {
        let config = LivenessConfig {
            required_actions: 4,
            ..Default::default()
        };
        let mut s = LivenessSession::new(config, ChallengeSelector::with_seed(4, 3));
        s.observe_face(&neutral_face(), at(0));

        let mut now = 0;
        while s.current_action() != Some(ActionKind::Blink) {
            let action = match s.current_action() {
                Some(action) => action,
                None => panic!("expected an active challenge"),
            };
            now += 100;
            perform(&mut s, action, now);
            now += 1_000;
            s.tick(at(now));
        }

        // the blink challenge starts from a cleared counter
        assert_eq!(s.blink_low_frames(), 0);
        s.observe_face(&face_with_eyes(0.1), at(now + 1));
        assert_eq!(s.blink_low_frames(), 1);
    }

    #[test]
    fn test_oversized_timings_saturate_instead_of_wrapping() {
        for ms in [i64::MAX as u64, u64::MAX] {
            let config = LivenessConfig {
                challenge_timeout_ms: ms,
                settle_delay_ms: ms,
                ..Default::default()
            };
            let mut s = LivenessSession::new(config, ChallengeSelector::with_seed(2, 11));

            let action = match s.observe_face(&neutral_face(), at(0)) {
                FrameOutcome::ChallengeIssued(action) => action,
                other => panic!("unexpected outcome {:?}", other),
            };
            assert_eq!(s.deadline(), Some(DateTime::<Utc>::MAX_UTC));
            assert_eq!(
                s.observe_face(&neutral_face(), at(0)),
                FrameOutcome::Pending(action)
            );

            perform(&mut s, action, 50);
            assert_eq!(s.status(), SessionStatus::Verifying);
            assert_eq!(s.tick(at(1_000_000)), FrameOutcome::Settling);
        }
    }

    #[test]
    fn test_cancel_and_fail_are_terminal_and_idempotent() {
        let (mut s, _) = challenged();
        assert!(s.cancel());
        assert_eq!(s.status(), SessionStatus::Cancelled);
        assert!(!s.cancel());
        assert!(!s.fail(FailureReason::CameraDenied));
        assert_eq!(s.status(), SessionStatus::Cancelled);

        let mut s = session();
        assert!(s.fail(FailureReason::CameraDenied));
        assert_eq!(s.failure_reason(), Some(FailureReason::CameraDenied));
    }
}
