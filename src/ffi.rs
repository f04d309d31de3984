//! FFI bindings for MindEase
//!
//! This module provides C-compatible functions for scoring readings from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using
//! `mindease_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::scorer::{effective_score, StressFactors};
use crate::thresholds::StressThresholds;
use crate::types::{BiometricSample, MonitorState, StressLevel};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

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

/// Thresholds from an optional config JSON; NULL means defaults
unsafe fn thresholds_from(config_json: *const c_char) -> Result<StressThresholds, MonitorError> {
    if config_json.is_null() {
        return Ok(StressThresholds::default());
    }
    let json = cstr_to_string(config_json)
        .ok_or_else(|| MonitorError::ParseError("Invalid config string pointer".to_string()))?;
    Ok(MonitorConfig::from_json(&json)?.thresholds)
}

#[derive(Serialize)]
struct Evaluation {
    score: f64,
    level: StressLevel,
    label: &'static str,
    percent: i64,
    alerting: bool,
}

fn evaluate(sample_json: &str, thresholds: &StressThresholds) -> Result<String, MonitorError> {
    let sample: BiometricSample = serde_json::from_str(sample_json)?;
    let score = effective_score(&sample);
    let level = thresholds.classify(score);
    let state = MonitorState {
        score,
        level,
        blinking: false,
    };

    let evaluation = Evaluation {
        score,
        level,
        label: level.label(),
        percent: state.percent(),
        alerting: level.is_alerting(),
    };
    Ok(serde_json::to_string(&evaluation)?)
}

// ============================================================================
// Scoring
// ============================================================================

/// Score one set of raw readings.
///
/// Heart rate is passed as a float so callers can forward device values
/// unchanged. The result is not clamped to 0..1.
#[no_mangle]
pub extern "C" fn mindease_stress_score(
    gsr: f64,
    heartbeat: f64,
    spo2: f64,
    temperature: f64,
) -> f64 {
    StressFactors::from_readings(gsr, heartbeat, spo2, temperature).score()
}

/// Evaluate a stored sample record and return a JSON summary
/// (`score`, `level`, `label`, `percent`, `alerting`).
///
/// A precomputed `stress_score` on the record is used as-is.
///
/// # Safety
/// - `sample_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL (default thresholds) or a valid C string.
/// - Returns a newly allocated string that must be freed with `mindease_free_string`.
/// - Returns NULL on error; call `mindease_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mindease_evaluate_sample(
    sample_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(sample_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid sample string pointer");
            return ptr::null_mut();
        }
    };

    let thresholds = match thresholds_from(config_json) {
        Ok(t) => t,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match evaluate(&json_str, &thresholds) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Classify a score and return the level name (`relaxed`, `moderate`,
/// `high`, `critical`).
///
/// # Safety
/// - `config_json` may be NULL (default thresholds) or a valid C string.
/// - Returns a newly allocated string that must be freed with `mindease_free_string`.
/// - Returns NULL on error; call `mindease_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mindease_classify(score: f64, config_json: *const c_char) -> *mut c_char {
    clear_last_error();

    if score.is_nan() {
        set_last_error("Score is NaN");
        return ptr::null_mut();
    }

    match thresholds_from(config_json) {
        Ok(thresholds) => string_to_cstr(thresholds.classify(score).as_str()),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by MindEase functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a MindEase function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mindease_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next MindEase function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mindease_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn mindease_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        mindease_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_stress_score_at_thresholds() {
        let score = mindease_stress_score(2500.0, 80.0, 95.0, 37.2);
        assert!((score - 1.0).abs() < 1e-12);

        let score = mindease_stress_score(1500.0, 72.0, 98.0, 36.5);
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_ffi_evaluate_sample() {
        let json = CString::new(
            r#"{"user_id": "u1", "gsr": 2500, "heartbeat": 80, "spo2": 95, "temperature": 37.2,
                "recorded_at": "2024-01-15T10:00:00Z"}"#,
        )
        .unwrap();

        unsafe {
            let result = take_string(mindease_evaluate_sample(json.as_ptr(), ptr::null()));
            let value: serde_json::Value = serde_json::from_str(&result).unwrap();

            assert_eq!(value["level"], "critical");
            assert_eq!(value["percent"], 100);
            assert_eq!(value["alerting"], true);
        }
    }

    #[test]
    fn test_ffi_evaluate_uses_stored_score() {
        let json = CString::new(
            r#"{"user_id": "u1", "gsr": 2500, "stress_score": 0.5,
                "recorded_at": "2024-01-15T10:00:00Z"}"#,
        )
        .unwrap();

        unsafe {
            let result = take_string(mindease_evaluate_sample(json.as_ptr(), ptr::null()));
            let value: serde_json::Value = serde_json::from_str(&result).unwrap();
            assert_eq!(value["level"], "moderate");
            assert_eq!(value["label"], "Moderate Stress");
        }
    }

    #[test]
    fn test_ffi_classify_with_config() {
        let config = CString::new(r#"{"thresholds": {"low": 0.3, "high": 0.7, "critical": 0.85}}"#)
            .unwrap();

        unsafe {
            assert_eq!(take_string(mindease_classify(0.87, ptr::null())), "high");
            assert_eq!(take_string(mindease_classify(0.87, config.as_ptr())), "critical");
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = mindease_evaluate_sample(invalid_json.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = mindease_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let bad_config = CString::new(r#"{"thresholds": {"low": 0.8, "high": 0.7, "critical": 0.9}}"#)
                .unwrap();
            assert!(mindease_classify(0.5, bad_config.as_ptr()).is_null());
            assert!(mindease_classify(f64::NAN, ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = mindease_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::MINDEASE_VERSION);
        }
    }
}
