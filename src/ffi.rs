//! FFI bindings for Breath Flux
//!
//! This module provides C-compatible functions for calling Breath Flux from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `breath_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PipelineConfig;
use crate::pipeline::{analyze_records_json, AnalysisProcessor};

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

/// Rust string to an owned C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Analysis API
// ============================================================================

/// Analyze candidate records with the default configuration.
///
/// `records` is one candidate document or a JSON array of documents.
///
/// # Safety
/// - `records` must be a valid null-terminated C string.
/// - Returns a newly allocated report string that must be freed with `breath_free_string`.
/// - Returns NULL on error; call `breath_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn breath_analyze_json(records: *const c_char) -> *mut c_char {
    clear_last_error();

    let records = match cstr_to_string(records) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records string pointer");
            return ptr::null_mut();
        }
    };

    match analyze_records_json(records) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Analyze candidate records with a JSON pipeline configuration.
///
/// Missing configuration fields take their defaults.
///
/// # Safety
/// - `records` and `config` must be valid null-terminated C strings.
/// - Returns a newly allocated report string that must be freed with `breath_free_string`.
/// - Returns NULL on error; call `breath_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn breath_analyze_json_with_config(
    records: *const c_char,
    config: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let records = match cstr_to_string(records) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records string pointer");
            return ptr::null_mut();
        }
    };

    let config = match cstr_to_string(config) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    let config = match PipelineConfig::from_json(&config) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match AnalysisProcessor::with_config(config).analyze_json(&records) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Breath Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Breath Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn breath_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Breath Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn breath_last_error() -> *const c_char {
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
pub unsafe extern "C" fn breath_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
