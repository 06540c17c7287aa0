//! Shared, synchronized access to one session
//!
//! Hosts that deliver frames on one thread and render state on another share
//! a [`LivenessHandle`]. Every call takes the same lock, so the session stays
//! a single owned object and readers never see a half-applied transition.
//! The completion callback runs after the lock is released, so it may read
//! the handle.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::controller::SessionController;
use crate::error::LivenessError;
use crate::types::{FrameOutcome, FrameRecord, LandmarkSet, SessionSnapshot, SessionStatus};

#[derive(Debug, Clone)]
pub struct LivenessHandle {
    inner: Arc<Mutex<SessionController>>,
}

impl LivenessHandle {
    pub fn new(mut controller: SessionController) -> Self {
        controller.defer_delivery();
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionController>, LivenessError> {
        self.inner.lock().map_err(|_| LivenessError::LockPoisoned)
    }

    /// Run `f` with exclusive access to the controller. A completion owed
    /// by `f` is delivered once the lock is released.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionController) -> R) -> Result<R, LivenessError> {
        let (result, pending) = {
            let mut guard = self.lock()?;
            let result = f(&mut guard);
            (result, guard.take_pending_completion())
        };

        if let Some(pending) = pending {
            pending.deliver();
        }
        Ok(result)
    }

    pub fn start(&self) -> Result<(), LivenessError> {
        self.with(|ctrl| ctrl.start())
    }

    pub fn on_frame(&self, faces: &[LandmarkSet]) -> Result<FrameOutcome, LivenessError> {
        self.with(|ctrl| ctrl.on_frame(faces))?
    }

    pub fn on_record(&self, record: &FrameRecord) -> Result<FrameOutcome, LivenessError> {
        self.with(|ctrl| ctrl.on_record(record))?
    }

    pub fn tick(&self) -> Result<FrameOutcome, LivenessError> {
        self.with(|ctrl| ctrl.tick())
    }

    pub fn cancel(&self) -> Result<FrameOutcome, LivenessError> {
        self.with(|ctrl| ctrl.cancel())
    }

    pub fn camera_denied(&self) -> Result<FrameOutcome, LivenessError> {
        self.with(|ctrl| ctrl.camera_denied())
    }

    pub fn status(&self) -> Result<SessionStatus, LivenessError> {
        Ok(self.lock()?.status())
    }

    pub fn is_terminal(&self) -> Result<bool, LivenessError> {
        Ok(self.lock()?.is_terminal())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, LivenessError> {
        Ok(self.lock()?.snapshot())
    }

    /// Tick the session every `period` until it ends, so a challenge still
    /// times out when the capture pipeline stops delivering frames.
    #[cfg(feature = "watchdog")]
    pub fn spawn_watchdog(&self, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let finished = handle.with(|ctrl| {
                    ctrl.tick();
                    ctrl.is_terminal()
                });
                match finished {
                    Ok(false) => continue,
                    Ok(true) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "watchdog stopped");
                        break;
                    }
                }
            }
        })
    }
}
