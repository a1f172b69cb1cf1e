//! C Bindings for chardev
//!
//! Mirrors a kernel file-operations table: open, release, read, write.
//! Counts come back as `isize`; `-1` means a transfer fault or a bad handle.

use crate::device::{CharDevice, DeviceConfig};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

// Opaque handle
pub struct ChardevHandle(CharDevice);

#[repr(C)]
pub struct ChardevConfig {
    /// Device name; null selects the default
    pub name: *const c_char,
    /// Class name; null selects the default
    pub class: *const c_char,
    /// Buffer capacity in bytes; 0 selects the default
    pub capacity: usize,
}

unsafe fn opt_str(raw: *const c_char) -> Option<Option<String>> {
    if raw.is_null() {
        return Some(None);
    }
    CStr::from_ptr(raw).to_str().ok().map(|s| Some(s.to_string()))
}

/// Create a device
///
/// Returns null if a name is not valid UTF-8 or the configuration is rejected.
///
/// # Safety
/// Non-null names must be valid null-terminated strings
#[no_mangle]
pub unsafe extern "C" fn chardev_create(config: ChardevConfig) -> *mut ChardevHandle {
    let mut rust_config = DeviceConfig::default();

    match opt_str(config.name) {
        Some(Some(name)) => rust_config.name = name,
        Some(None) => {}
        None => return ptr::null_mut(),
    }
    match opt_str(config.class) {
        Some(Some(class)) => rust_config.class = class,
        Some(None) => {}
        None => return ptr::null_mut(),
    }
    if config.capacity != 0 {
        rust_config.capacity = config.capacity;
    }

    match CharDevice::new(rust_config) {
        Ok(device) => Box::into_raw(Box::new(ChardevHandle(device))),
        Err(_) => ptr::null_mut(),
    }
}

/// Destroy a device handle
#[no_mangle]
pub unsafe extern "C" fn chardev_destroy(handle: *mut ChardevHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Open the device. Returns the open count, or -1 for a null handle
#[no_mangle]
pub unsafe extern "C" fn chardev_open(handle: *const ChardevHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    let device = &(*handle).0;
    let session = device.open();
    let id = session.id() as i64;
    // The C side tracks its own open/release pairing
    std::mem::forget(session);
    id
}

/// Release the device. Always 0 for a valid handle
#[no_mangle]
pub unsafe extern "C" fn chardev_close(handle: *const ChardevHandle) -> i32 {
    if handle.is_null() {
        return -1;
    }
    match (*handle).0.close() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Write up to `len` bytes; returns bytes accepted (0 when full)
#[no_mangle]
pub unsafe extern "C" fn chardev_write(
    handle: *const ChardevHandle,
    buf: *const u8,
    len: usize,
) -> isize {
    if handle.is_null() || (buf.is_null() && len != 0) {
        return -1;
    }
    let device = &(*handle).0;
    let src = if len == 0 { &[][..] } else { slice::from_raw_parts(buf, len) };
    match device.write(src) {
        Ok(outcome) => outcome.accepted as isize,
        Err(_) => -1,
    }
}

/// Read up to `len` bytes into `buf`; returns bytes read (0 when empty)
#[no_mangle]
pub unsafe extern "C" fn chardev_read(
    handle: *const ChardevHandle,
    buf: *mut u8,
    len: usize,
) -> isize {
    if handle.is_null() || (buf.is_null() && len != 0) {
        return -1;
    }
    let device = &(*handle).0;
    let dst = if len == 0 { &mut [][..] } else { slice::from_raw_parts_mut(buf, len) };
    match device.read(dst) {
        Ok(outcome) => outcome.returned as isize,
        Err(_) => -1,
    }
}

/// Pending byte count
#[no_mangle]
pub unsafe extern "C" fn chardev_len(handle: *const ChardevHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.len()
}

/// Buffer capacity
#[no_mangle]
pub unsafe extern "C" fn chardev_capacity(handle: *const ChardevHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.capacity()
}
