//! FFI bindings for the liveness engine
//!
//! This module provides C-compatible functions for driving a liveness session
//! from other languages. Frames and results cross the boundary as JSON. All
//! returned strings are newly allocated and must be freed by the caller with
//! `liveness_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::SystemClock;
use crate::config::LivenessConfig;
use crate::controller::SessionController;
use crate::error::LivenessError;
use crate::handle::LivenessHandle;
use crate::selector::ChallengeSelector;
use crate::types::{FrameOutcome, FrameRecord};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value`, or record the error and return NULL
fn json_or_null<T: Serialize>(value: Result<T, LivenessError>) -> *mut c_char {
    match value.and_then(|v| serde_json::to_string(&v).map_err(LivenessError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Map a unit result to a C status code
fn status_code(result: Result<(), LivenessError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Opaque handle to a liveness session
pub struct LivenessSessionHandle {
    handle: LivenessHandle,
}

/// Create a session on the system clock.
///
/// A negative `seed` draws challenges from entropy; any other value makes the
/// challenge order reproducible.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `liveness_session_free`.
/// - Returns NULL on error; call `liveness_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_new(
    config_json: *const c_char,
    seed: i64,
) -> *mut LivenessSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        LivenessConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match LivenessConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let selector = if seed < 0 {
        ChallengeSelector::new(config.required_actions)
    } else {
        ChallengeSelector::with_seed(config.required_actions, seed as u64)
    };

    match SessionController::with_parts(config, Arc::new(SystemClock), selector) {
        Ok(controller) => Box::into_raw(Box::new(LivenessSessionHandle {
            handle: LivenessHandle::new(controller),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_free(session: *mut LivenessSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Begin accepting frames.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_start(session: *const LivenessSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    status_code((*session).handle.start())
}

// ============================================================================
// Frame Input
// ============================================================================

/// Feed one detector result and return the step report as JSON.
///
/// `frame_json` is a frame record: `{"faces": [[{"x":..,"y":..,"z":..}, ...]]}`,
/// optionally with `"event": "camera_denied" | "cancel"`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `liveness_free_string`.
/// - Returns NULL on error; call `liveness_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_feed(
    session: *const LivenessSessionHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let frame_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let report = serde_json::from_str::<FrameRecord>(&frame_str)
        .map_err(LivenessError::from)
        .and_then(|record| {
            (*session).handle.with(|ctrl| {
                let outcome = ctrl.on_record(&record)?;
                Ok::<_, LivenessError>(ctrl.report(outcome))
            })?
        });

    json_or_null(report)
}

/// Apply time-driven transitions and return the step report as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns a newly allocated string that must be freed with `liveness_free_string`.
/// - Returns NULL on error; call `liveness_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_tick(
    session: *const LivenessSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    json_or_null((*session).handle.with(|ctrl| {
        let outcome = ctrl.tick();
        ctrl.report(outcome)
    }))
}

/// Cancel the session. Calling it again is a no-op.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_cancel(session: *const LivenessSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    status_code((*session).handle.cancel().map(|_: FrameOutcome| ()))
}

/// Report that camera access was denied.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_camera_denied(
    session: *const LivenessSessionHandle,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    status_code((*session).handle.camera_denied().map(|_: FrameOutcome| ()))
}

// ============================================================================
// State
// ============================================================================

/// Current session snapshot as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns a newly allocated string that must be freed with `liveness_free_string`.
/// - Returns NULL on error; call `liveness_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_snapshot(
    session: *const LivenessSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    json_or_null((*session).handle.snapshot())
}

/// Completion event as JSON, or the string `null` while the session runs.
///
/// # Safety
/// - `session` must be a valid pointer returned by `liveness_session_new`.
/// - Returns a newly allocated string that must be freed with `liveness_free_string`.
/// - Returns NULL on error; call `liveness_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn liveness_session_outcome(
    session: *const LivenessSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    json_or_null((*session).handle.with(|ctrl| ctrl.outcome().cloned()))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a liveness function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a liveness function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn liveness_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next liveness call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn liveness_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn liveness_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
