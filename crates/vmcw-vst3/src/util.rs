//! String, identifier and reference-count helpers for the VST3 ABI.

use std::ffi::{c_char, CStr};

use vst3::Steinberg::Vst::TChar;
use vst3::Steinberg::{FUnknown, TUID};
use vst3::{ComPtr, ComRef, Interface};

/// Copy a string into a fixed-size C string buffer, truncating and
/// NUL-terminating.
pub fn copy_cstring(src: &str, dst: &mut [c_char]) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let len = src.len().min(max);
    for (d, s) in dst.iter_mut().zip(src.as_bytes()[..len].iter()) {
        *d = *s as c_char;
    }
    dst[len] = 0;
}

/// Encode a string as UTF-16 into a fixed-size buffer (`String128` and
/// friends), truncating to `dst.len() - 1` code units and NUL-terminating.
pub fn copy_wstring(src: &str, dst: &mut [TChar]) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let mut len = 0;
    for (d, s) in dst.iter_mut().take(max).zip(src.encode_utf16()) {
        *d = s as TChar;
        len += 1;
    }
    dst[len] = 0;
}

/// Decode a UTF-16 buffer up to the first NUL. Unpaired surrogates become
/// U+FFFD.
pub fn wstring_to_string(src: &[TChar]) -> String {
    let end = src.iter().position(|&c| c == 0).unwrap_or(src.len());
    let units: Vec<u16> = src[..end].iter().map(|&c| c as u16).collect();
    String::from_utf16_lossy(&units)
}

/// Decode a C string buffer up to the first NUL.
pub fn cstring_to_string(src: &[c_char]) -> String {
    let end = src.iter().position(|&c| c == 0).unwrap_or(src.len());
    let bytes: Vec<u8> = src[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Length of a NUL-terminated UTF-16 string.
///
/// # Safety
///
/// `string` must be non-null and point to a NUL-terminated buffer.
pub unsafe fn len_wstring(string: *const TChar) -> usize {
    let mut len = 0;
    // SAFETY: Caller guarantees the buffer is NUL-terminated.
    while unsafe { *string.add(len) } != 0 {
        len += 1;
    }
    len
}

/// Compare a host-supplied C string with `expected`. Null never matches.
///
/// # Safety
///
/// `string` must be null or point to a NUL-terminated C string.
pub unsafe fn fid_eq(string: *const c_char, expected: &str) -> bool {
    if string.is_null() {
        return false;
    }
    // SAFETY: Non-null and NUL-terminated per caller contract.
    unsafe { CStr::from_ptr(string) }.to_bytes() == expected.as_bytes()
}

/// Interface id of `I` as a `TUID` for `createInstance`/`queryInterface`.
pub fn iid_of<I: Interface>() -> TUID {
    let mut tuid: TUID = [0; 16];
    for (dst, src) in tuid.iter_mut().zip(I::IID.iter()) {
        *dst = *src as c_char;
    }
    tuid
}

/// Build a class id from the four words stored in `WrapperConfig`.
pub const fn class_id(words: [u32; 4]) -> TUID {
    vst3::uid(words[0], words[1], words[2], words[3])
}

/// Take a counted reference to a borrowed interface pointer. Null gives `None`.
///
/// # Safety
///
/// `ptr` must be null or a valid COM pointer.
pub unsafe fn retain<I: Interface>(ptr: *mut I) -> Option<ComPtr<I>> {
    // SAFETY: Caller guarantees validity; to_com_ptr adds a reference.
    unsafe { ComRef::from_raw(ptr) }.map(|r| r.to_com_ptr())
}

/// AddRef a non-null COM pointer.
///
/// # Safety
///
/// `ptr` must be null or a valid COM pointer.
pub unsafe fn add_ref<I>(ptr: *mut I) {
    if !ptr.is_null() {
        let unknown = ptr as *mut FUnknown;
        // SAFETY: Every VST3 interface starts with the FUnknown vtable.
        unsafe { ((*(*unknown).vtbl).addRef)(unknown) };
    }
}

/// Release a non-null COM pointer.
///
/// # Safety
///
/// `ptr` must be null or a valid COM pointer the caller owns a reference to.
pub unsafe fn release<I>(ptr: *mut I) {
    if !ptr.is_null() {
        let unknown = ptr as *mut FUnknown;
        // SAFETY: Every VST3 interface starts with the FUnknown vtable.
        unsafe { ((*(*unknown).vtbl).release)(unknown) };
    }
}
