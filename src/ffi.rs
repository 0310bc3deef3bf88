//! FFI bindings for Heartzone
//!
//! C-compatible functions for embedding the zone pipeline in a host app (for
//! example a watch app that owns the platform health service and haptics).
//! Strings are null-terminated; returned strings are allocated and must be freed
//! with `hz_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::MonitorError;
use crate::pipeline::SamplePipeline;
use crate::source::parse_array;
use crate::zone::{classify, Zone};

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

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify a heart rate. Returns the zone index (Rest = 0 .. Peak = 3).
///
/// # Safety
/// - Safe to call with any values.
/// - Returns -1 if `max_heart_rate` is not positive; call `hz_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn hz_classify(bpm: f64, max_heart_rate: f64) -> i32 {
    clear_last_error();

    match classify(bpm, max_heart_rate) {
        Ok(zone) => zone.index(),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Name of a zone index (`rest`, `fat_burn`, `cardio`, `peak`).
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
/// - Returns NULL for an unknown index.
#[no_mangle]
pub unsafe extern "C" fn hz_zone_name(index: i32) -> *const c_char {
    static NAMES: [&[u8]; 4] = [b"rest\0", b"fat_burn\0", b"cardio\0", b"peak\0"];

    match Zone::from_index(index) {
        Some(zone) => NAMES[zone.index() as usize].as_ptr() as *const c_char,
        None => ptr::null(),
    }
}

// ============================================================================
// Stateful Pipeline API
// ============================================================================

/// Opaque handle to a SamplePipeline
pub struct HzPipelineHandle {
    pipeline: SamplePipeline,
}

/// Create a pipeline. A non-positive `max_heart_rate` selects the default (190).
///
/// # Safety
/// - Must be freed with `hz_pipeline_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_new(max_heart_rate: f64) -> *mut HzPipelineHandle {
    clear_last_error();

    let pipeline = if max_heart_rate <= 0.0 {
        SamplePipeline::default()
    } else {
        match SamplePipeline::new(max_heart_rate) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(HzPipelineHandle { pipeline }))
}

/// Free a pipeline.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_free(pipeline: *mut HzPipelineHandle) {
    if !pipeline.is_null() {
        drop(Box::from_raw(pipeline));
    }
}

/// Start a new session (clears samples and the previous zone).
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`.
/// - Returns 0 on success, -1 on a null pointer.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_start(pipeline: *mut HzPipelineHandle) -> i32 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    (*pipeline).pipeline.start();
    0
}

/// Stop the session; samples are retained.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`.
/// - Returns 0 on success, -1 on a null pointer.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_stop(pipeline: *mut HzPipelineHandle) -> i32 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    (*pipeline).pipeline.stop();
    0
}

/// Ingest a JSON array of samples (newest first) and return the outcome as JSON.
///
/// The result is `null` for an empty batch. Feedback effects in the outcome are for
/// the host to play.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `hz_free_string`.
/// - Returns NULL on error; call `hz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_ingest(
    pipeline: *mut HzPipelineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    let handle = &mut *pipeline;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let outcome = parse_array(&json_str).and_then(|batch| handle.pipeline.ingest(&batch));
    match outcome.and_then(|outcome| serde_json::to_string(&outcome).map_err(MonitorError::from)) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Session statistics as JSON.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `hz_free_string`.
/// - Returns NULL on error; call `hz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_stats(pipeline: *mut HzPipelineHandle) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    let handle = &*pipeline;

    match serde_json::to_string(&handle.pipeline.stats()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Set max heart rate to `220 - age` for subsequent classifications.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `hz_pipeline_new`.
/// - Returns the new max heart rate, or -1.0 on error.
#[no_mangle]
pub unsafe extern "C" fn hz_pipeline_set_age(pipeline: *mut HzPipelineHandle, age: u32) -> f64 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1.0;
    }

    match (*pipeline).pipeline.set_age(age) {
        Ok(max_heart_rate) => max_heart_rate,
        Err(e) => {
            set_last_error(&e.to_string());
            -1.0
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Heartzone functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Heartzone function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hz_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Heartzone call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn hz_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Heartzone library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn hz_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_json(bpm: f64, timestamp: &str) -> CString {
        CString::new(format!(r#"[{{"bpm": {bpm}, "timestamp": "{timestamp}"}}]"#)).unwrap()
    }

    #[test]
    fn test_ffi_classify() {
        unsafe {
            assert_eq!(hz_classify(100.0, 190.0), 0);
            assert_eq!(hz_classify(165.0, 190.0), 3);

            assert_eq!(hz_classify(100.0, 0.0), -1);
            assert!(!hz_last_error().is_null());

            let name = CStr::from_ptr(hz_zone_name(2)).to_str().unwrap();
            assert_eq!(name, "cardio");
            assert!(hz_zone_name(9).is_null());
        }
    }

    #[test]
    fn test_ffi_pipeline_lifecycle() {
        unsafe {
            let pipeline = hz_pipeline_new(190.0);
            assert!(!pipeline.is_null());
            assert_eq!(hz_pipeline_start(pipeline), 0);

            let first = batch_json(150.0, "2024-01-15T14:00:00Z");
            let result = hz_pipeline_ingest(pipeline, first.as_ptr());
            assert!(!result.is_null());
            hz_free_string(result);

            let second = batch_json(165.0, "2024-01-15T14:00:30Z");
            let result = hz_pipeline_ingest(pipeline, second.as_ptr());
            assert!(!result.is_null());
            let outcome: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(outcome["zone"], "peak");
            assert_eq!(outcome["transition"]["direction"], "up");
            assert_eq!(outcome["effects"][0], "escalate");
            assert_eq!(outcome["effects"][1], "warning");
            hz_free_string(result);

            let stats = hz_pipeline_stats(pipeline);
            let stats_json: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(stats).to_str().unwrap()).unwrap();
            assert_eq!(stats_json["count"], 2);
            assert_eq!(stats_json["duration_secs"], 30.0);
            hz_free_string(stats);

            assert_eq!(hz_pipeline_set_age(pipeline, 30), 190.0);
            assert_eq!(hz_pipeline_set_age(pipeline, 221), -1.0);
            assert_eq!(hz_pipeline_stop(pipeline), 0);

            hz_pipeline_free(pipeline);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let pipeline = hz_pipeline_new(0.0);
            let invalid = CString::new("not json").unwrap();

            let result = hz_pipeline_ingest(pipeline, invalid.as_ptr());
            assert!(result.is_null());

            let error = hz_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert!(hz_pipeline_ingest(ptr::null_mut(), invalid.as_ptr()).is_null());
            hz_pipeline_free(pipeline);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = hz_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
