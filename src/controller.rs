//! Session controller
//!
//! The public entry point for a liveness check. The controller owns the one
//! long-lived [`LivenessSession`], reads the clock, applies the multi-face
//! policy, releases the capture source, and fires the completion callback
//! exactly once.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{LivenessConfig, MultiFacePolicy};
use crate::error::LivenessError;
use crate::selector::ChallengeSelector;
use crate::session::LivenessSession;
use crate::types::{
    ActionKind, CaptureEvent, CompletionEvent, FailureReason, FrameOutcome, FrameRecord,
    LandmarkSet, SessionSnapshot, SessionStatus, StepReport,
};

/// Handle on the capture pipeline feeding the session.
///
/// The controller stops and drops it as soon as the session ends.
pub trait CaptureSource: Send {
    fn stop(&mut self);
}

/// Called once with the terminal outcome of a session
pub type CompletionCallback = Box<dyn FnOnce(&CompletionEvent) + Send>;

/// A completion callback paired with the event it is owed
pub(crate) struct PendingCompletion {
    callback: CompletionCallback,
    event: CompletionEvent,
}

impl PendingCompletion {
    pub(crate) fn deliver(self) {
        (self.callback)(&self.event);
    }
}

pub struct SessionController {
    id: Uuid,
    session: LivenessSession,
    clock: Arc<dyn Clock>,
    started_at: Option<DateTime<Utc>>,
    on_complete: Option<CompletionCallback>,
    outcome: Option<CompletionEvent>,
    delivered: bool,
    pending: Option<PendingCompletion>,
    defer_delivery: bool,
    capture: Option<Box<dyn CaptureSource>>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("status", &self.session.status())
            .field("completed", &self.session.completed_actions())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl SessionController {
    /// Controller on the system clock with an entropy-seeded selector
    pub fn new(config: LivenessConfig) -> Result<Self, LivenessError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LivenessConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LivenessError> {
        let selector = ChallengeSelector::new(config.required_actions);
        Self::with_parts(config, clock, selector)
    }

    /// Controller with an explicit clock and selector, e.g. for replays
    pub fn with_parts(
        config: LivenessConfig,
        clock: Arc<dyn Clock>,
        selector: ChallengeSelector,
    ) -> Result<Self, LivenessError> {
        config.validate()?;
        if selector.required() != config.required_actions {
            return Err(LivenessError::InvalidConfig(format!(
                "selector requires {} actions but config requires {}",
                selector.required(),
                config.required_actions
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            session: LivenessSession::new(config, selector),
            clock,
            started_at: None,
            on_complete: None,
            outcome: None,
            delivered: false,
            pending: None,
            defer_delivery: false,
            capture: None,
        })
    }

    /// Register the completion callback. If the session already finished and
    /// no callback has seen the outcome, it fires immediately.
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnOnce(&CompletionEvent) + Send + 'static,
    {
        if self.delivered {
            return;
        }
        match &self.outcome {
            Some(event) => {
                self.delivered = true;
                self.pending = Some(PendingCompletion {
                    callback: Box::new(callback),
                    event: event.clone(),
                });
                self.deliver_pending();
            }
            None => self.on_complete = Some(Box::new(callback)),
        }
    }

    /// Hold the completion callback until [`Self::take_pending_completion`]
    /// instead of running it inside the call that ended the session. Used by
    /// the shared handle so the callback runs after its lock is released.
    pub(crate) fn defer_delivery(&mut self) {
        self.defer_delivery = true;
    }

    pub(crate) fn take_pending_completion(&mut self) -> Option<PendingCompletion> {
        self.pending.take()
    }

    fn deliver_pending(&mut self) {
        if self.defer_delivery {
            return;
        }
        if let Some(pending) = self.pending.take() {
            pending.deliver();
        }
    }

    /// Hand over the capture source; stopped immediately if already finished
    pub fn attach_capture(&mut self, mut capture: Box<dyn CaptureSource>) {
        if self.session.is_terminal() {
            capture.stop();
            return;
        }
        self.capture = Some(capture);
    }

    /// Begin accepting frames. Repeated calls are ignored.
    pub fn start(&mut self) {
        if self.started_at.is_some() || self.session.is_terminal() {
            debug!(session_id = %self.id, "start ignored");
            return;
        }
        let now = self.clock.now();
        self.started_at = Some(now);
        info!(
            session_id = %self.id,
            required = self.session.config().required_actions,
            "liveness session started"
        );
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Feed the faces the detector reported for one frame, primary first.
    /// An empty slice means no face was found.
    pub fn on_frame(&mut self, faces: &[LandmarkSet]) -> Result<FrameOutcome, LivenessError> {
        if self.started_at.is_none() || self.session.is_terminal() {
            return Ok(FrameOutcome::Ignored);
        }

        let face = match (faces.len(), self.session.config().multi_face_policy) {
            (0, _) => None,
            (1, _) | (_, MultiFacePolicy::FirstFace) => Some(&faces[0]),
            (count, MultiFacePolicy::Reject) => {
                warn!(session_id = %self.id, faces = count, "ambiguous frame skipped");
                let now = self.clock.now();
                let outcome = match self.session.observe_no_face(now) {
                    FrameOutcome::NoFace => FrameOutcome::AmbiguousFaces(count),
                    outcome => outcome,
                };
                self.finish_if_terminal(now);
                return Ok(outcome);
            }
        };

        let now = self.clock.now();
        let outcome = match face {
            Some(face) => {
                let required = self.session.config().layout.required_len();
                if face.len() < required {
                    warn!(
                        session_id = %self.id,
                        landmarks = face.len(),
                        required,
                        "malformed landmark set"
                    );
                    return Err(LivenessError::MalformedLandmarks {
                        required,
                        actual: face.len(),
                    });
                }
                self.session.observe_face(face, now)
            }
            None => self.session.observe_no_face(now),
        };

        self.finish_if_terminal(now);
        Ok(outcome)
    }

    /// Convenience for detectors that report at most one face
    pub fn on_landmarks(
        &mut self,
        face: Option<&LandmarkSet>,
    ) -> Result<FrameOutcome, LivenessError> {
        match face {
            Some(face) => self.on_frame(std::slice::from_ref(face)),
            None => self.on_frame(&[]),
        }
    }

    /// Feed a recorded detector output, including out-of-band events
    pub fn on_record(&mut self, record: &FrameRecord) -> Result<FrameOutcome, LivenessError> {
        match record.event {
            Some(CaptureEvent::CameraDenied) => Ok(self.camera_denied()),
            Some(CaptureEvent::Cancel) => Ok(self.cancel()),
            None => self.on_frame(&record.faces),
        }
    }

    /// Apply time-driven transitions without a frame
    pub fn tick(&mut self) -> FrameOutcome {
        if self.started_at.is_none() || self.session.is_terminal() {
            return FrameOutcome::Ignored;
        }
        let now = self.clock.now();
        let outcome = self.session.tick(now);
        self.finish_if_terminal(now);
        outcome
    }

    /// Cancel the session. Idempotent; a no-op once terminal.
    pub fn cancel(&mut self) -> FrameOutcome {
        if !self.session.cancel() {
            return FrameOutcome::Ignored;
        }
        self.finish_if_terminal(self.clock.now());
        FrameOutcome::Finished(SessionStatus::Cancelled)
    }

    /// The capture collaborator lost or was refused camera access
    pub fn camera_denied(&mut self) -> FrameOutcome {
        if !self.session.fail(FailureReason::CameraDenied) {
            return FrameOutcome::Ignored;
        }
        self.finish_if_terminal(self.clock.now());
        FrameOutcome::Finished(SessionStatus::Failure)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session(&self) -> &LivenessSession {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.session.failure_reason()
    }

    pub fn current_action(&self) -> Option<ActionKind> {
        self.session.current_action()
    }

    pub fn completed_actions(&self) -> &[ActionKind] {
        self.session.completed_actions()
    }

    pub fn progress_fraction(&self) -> f64 {
        self.session.progress_fraction()
    }

    /// The completion event, once the session has finished
    pub fn outcome(&self) -> Option<&CompletionEvent> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current_action = self.session.current_action();
        SessionSnapshot {
            session_id: self.id,
            status: self.session.status(),
            failure_reason: self.session.failure_reason(),
            current_action,
            prompt: current_action.map(|a| a.prompt().to_string()),
            progress_fraction: self.session.progress_fraction(),
            completed_actions: self.session.completed_actions().to_vec(),
            remaining_ms: self.session.remaining_ms(self.clock.now()),
        }
    }

    /// Pair an outcome with the state it produced
    pub fn report(&self, outcome: FrameOutcome) -> StepReport {
        StepReport {
            outcome,
            snapshot: self.snapshot(),
        }
    }

    fn finish_if_terminal(&mut self, now: DateTime<Utc>) {
        if !self.session.is_terminal() || self.outcome.is_some() {
            return;
        }

        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }

        let elapsed_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0))
            .unwrap_or(0);

        let event = CompletionEvent {
            session_id: self.id,
            status: self.session.status(),
            failure_reason: self.session.failure_reason(),
            completed_actions: self.session.completed_actions().to_vec(),
            elapsed_ms,
        };

        info!(
            session_id = %self.id,
            status = event.status.as_str(),
            elapsed_ms,
            "liveness session finished"
        );

        if let Some(callback) = self.on_complete.take() {
            self.delivered = true;
            self.pending = Some(PendingCompletion {
                callback,
                event: event.clone(),
            });
        }
        self.outcome = Some(event);
        self.deliver_pending();
    }
}
