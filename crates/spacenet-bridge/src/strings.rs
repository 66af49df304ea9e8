//! C string conversions at the boundary.

use std::ffi::{c_char, CStr, CString};

use crate::BridgeError;

/// Copies a required, NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn read_str(ptr: *const c_char) -> Result<String, BridgeError> {
    if ptr.is_null() {
        return Err(BridgeError::InvalidString);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|_| BridgeError::InvalidString)
}

/// Like [`read_str`], but null means "absent".
///
/// # Safety
///
/// Same contract as [`read_str`].
pub unsafe fn read_optional_str(ptr: *const c_char) -> Result<Option<String>, BridgeError> {
    if ptr.is_null() {
        return Ok(None);
    }
    read_str(ptr).map(Some)
}

/// Encodes `text` for the front-end, truncating at an interior NUL.
pub fn to_cstring(text: &str) -> CString {
    let bytes = text.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // No NUL remains in `bytes[..end]`.
    CString::new(&bytes[..end]).unwrap_or_default()
}
