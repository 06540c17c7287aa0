//! Attendance Liveness - Challenge-response liveness verification for camera attendance
//!
//! A session issues randomized physical challenges (blink, turn left, turn
//! right, smile) and verifies them frame by frame from facial landmarks:
//! landmark geometry → per-frame features → challenge evaluation → session
//! state machine → one completion event.
//!
//! ## Modules
//!
//! - **Geometry**: `features` turns a landmark set into eye openness, head yaw
//!   and mouth width signals
//! - **Session**: `selector`, `evaluator` and `session` implement the challenge
//!   state machine; `controller` owns it, reads the clock and reports completion
//! - **Integration**: `handle` shares a session across threads, `ffi` exposes it
//!   over a C ABI

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod handle;
pub mod selector;
pub mod session;
pub mod types;

// FFI bindings for C interop (on by default for cdylib/staticlib builds)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LandmarkLayout, LivenessConfig, MultiFacePolicy};
pub use controller::{CaptureSource, SessionController};
pub use error::LivenessError;
pub use features::FaceFeatures;
pub use handle::LivenessHandle;
pub use types::{
    ActionKind, CompletionEvent, FailureReason, FrameOutcome, FrameRecord, Landmark, LandmarkSet,
    SessionSnapshot, SessionStatus,
};

/// Engine version reported by the CLI and the C ABI
pub const LIVENESS_VERSION: &str = env!("CARGO_PKG_VERSION");
