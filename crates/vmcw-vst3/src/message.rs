//! Inter-object messages between the two wrapper identities.
//!
//! The processing and control identities cannot call each other directly,
//! so they talk through `IConnectionPoint::notify` with `IMessage` objects:
//!
//! ```text
//! controller ──LoadPlugin{path}──> processor
//! controller <─PluginLoaded{path}── processor
//! controller ──UnloadPlugin{}────> processor
//! ```
//!
//! Messages are allocated through the host's `IHostApplication` when it
//! offers one, and otherwise from the in-process [`Message`] below.

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};

use parking_lot::Mutex;
use vst3::Steinberg::Vst::{
    IAttributeList, IAttributeListTrait, IHostApplication, IHostApplicationTrait, IMessage,
    IMessageTrait, TChar,
};
use vst3::Steinberg::{
    int64, kInvalidArgument, kResultFalse, kResultOk, tresult, uint32, FIDString, TUID,
};
use vst3::{Class, ComPtr, ComRef, ComWrapper};

use crate::util::{iid_of, len_wstring};

/// Controller → processor: load the plugin at `path`.
pub const MSG_LOAD_PLUGIN: &CStr = c"LoadPlugin";
/// Processor → controller: a load attempt finished.
pub const MSG_PLUGIN_LOADED: &CStr = c"PluginLoaded";
/// Controller → processor: drop the hosted plugin.
pub const MSG_UNLOAD_PLUGIN: &CStr = c"UnloadPlugin";
/// Binary attribute carrying the plugin path.
pub const ATTR_PATH: &CStr = c"path";

// =============================================================================
// AttributeList
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum AttrValue {
    Int(i64),
    Float(f64),
    String(Vec<TChar>),
    Binary(Vec<u8>),
}

/// Key/value store behind [`Message::getAttributes`].
///
/// Binary and string getters hand out pointers into the stored value; they
/// stay valid until the same key is overwritten.
#[derive(Default)]
pub struct AttributeList {
    values: Mutex<HashMap<String, AttrValue>>,
}

/// # Safety
///
/// `id` must be null or a NUL-terminated C string.
unsafe fn attr_key(id: *const c_char) -> Option<String> {
    if id.is_null() {
        return None;
    }
    // SAFETY: Non-null and NUL-terminated per caller contract.
    Some(unsafe { CStr::from_ptr(id) }.to_string_lossy().into_owned())
}

impl AttributeList {
    fn set(&self, id: *const c_char, value: AttrValue) -> tresult {
        // SAFETY: Attribute ids come from the caller as C strings.
        let Some(key) = (unsafe { attr_key(id) }) else {
            return kInvalidArgument;
        };
        self.values.lock().insert(key, value);
        kResultOk
    }

    fn get(&self, id: *const c_char) -> Option<AttrValue> {
        // SAFETY: Attribute ids come from the caller as C strings.
        let key = unsafe { attr_key(id) }?;
        self.values.lock().get(&key).cloned()
    }
}

impl Class for AttributeList {
    type Interfaces = (IAttributeList,);
}

impl IAttributeListTrait for AttributeList {
    unsafe fn setInt(&self, id: *const c_char, value: int64) -> tresult {
        self.set(id, AttrValue::Int(value))
    }

    unsafe fn getInt(&self, id: *const c_char, value: *mut int64) -> tresult {
        match (self.get(id), value.is_null()) {
            // SAFETY: value is non-null.
            (Some(AttrValue::Int(v)), false) => unsafe {
                *value = v;
                kResultOk
            },
            _ => kResultFalse,
        }
    }

    unsafe fn setFloat(&self, id: *const c_char, value: f64) -> tresult {
        self.set(id, AttrValue::Float(value))
    }

    unsafe fn getFloat(&self, id: *const c_char, value: *mut f64) -> tresult {
        match (self.get(id), value.is_null()) {
            // SAFETY: value is non-null.
            (Some(AttrValue::Float(v)), false) => unsafe {
                *value = v;
                kResultOk
            },
            _ => kResultFalse,
        }
    }

    unsafe fn setString(&self, id: *const c_char, string: *const TChar) -> tresult {
        if string.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Non-null, NUL-terminated UTF-16 per the IAttributeList contract.
        let len = unsafe { len_wstring(string) };
        // SAFETY: len units were just counted.
        let units = unsafe { std::slice::from_raw_parts(string, len) }.to_vec();
        self.set(id, AttrValue::String(units))
    }

    unsafe fn getString(&self, id: *const c_char, string: *mut TChar, size_in_bytes: uint32) -> tresult {
        let Some(AttrValue::String(units)) = self.get(id) else {
            return kResultFalse;
        };
        let capacity = size_in_bytes as usize / std::mem::size_of::<TChar>();
        if string.is_null() || capacity == 0 {
            return kInvalidArgument;
        }
        let count = units.len().min(capacity - 1);
        // SAFETY: string holds `capacity` units and count + 1 <= capacity.
        unsafe {
            std::ptr::copy_nonoverlapping(units.as_ptr(), string, count);
            *string.add(count) = 0;
        }
        kResultOk
    }

    unsafe fn setBinary(&self, id: *const c_char, data: *const c_void, size_in_bytes: uint32) -> tresult {
        let bytes = if data.is_null() || size_in_bytes == 0 {
            Vec::new()
        } else {
            // SAFETY: data holds size_in_bytes bytes per the IAttributeList contract.
            unsafe { std::slice::from_raw_parts(data as *const u8, size_in_bytes as usize) }.to_vec()
        };
        self.set(id, AttrValue::Binary(bytes))
    }

    unsafe fn getBinary(
        &self,
        id: *const c_char,
        data: *mut *const c_void,
        size_in_bytes: *mut uint32,
    ) -> tresult {
        if data.is_null() || size_in_bytes.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Both out-parameters are non-null.
        unsafe {
            *data = std::ptr::null();
            *size_in_bytes = 0;
        }
        // SAFETY: Attribute ids come from the caller as C strings.
        let Some(key) = (unsafe { attr_key(id) }) else {
            return kInvalidArgument;
        };
        let values = self.values.lock();
        match values.get(&key) {
            Some(AttrValue::Binary(bytes)) => {
                // SAFETY: Both out-parameters are non-null. The Vec's heap buffer
                // outlives the lock until the key is overwritten.
                unsafe {
                    *data = bytes.as_ptr() as *const c_void;
                    *size_in_bytes = bytes.len() as uint32;
                }
                kResultOk
            }
            _ => kResultFalse,
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// In-process `IMessage` used when the host does not provide one.
pub struct Message {
    id: Mutex<Option<CString>>,
    attributes: ComWrapper<AttributeList>,
}

impl Message {
    pub fn new() -> Self {
        Self {
            id: Mutex::new(None),
            attributes: ComWrapper::new(AttributeList::default()),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Class for Message {
    type Interfaces = (IMessage,);
}

impl IMessageTrait for Message {
    unsafe fn getMessageID(&self) -> FIDString {
        self.id
            .lock()
            .as_ref()
            .map_or(std::ptr::null(), |id| id.as_ptr())
    }

    unsafe fn setMessageID(&self, id: FIDString) {
        let id = if id.is_null() {
            None
        } else {
            // SAFETY: Non-null, NUL-terminated per the IMessage contract.
            Some(unsafe { CStr::from_ptr(id) }.to_owned())
        };
        *self.id.lock() = id;
    }

    unsafe fn getAttributes(&self) -> *mut IAttributeList {
        self.attributes
            .as_com_ref::<IAttributeList>()
            .map_or(std::ptr::null_mut(), |attributes| attributes.as_ptr())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Allocate an empty message, preferring the host's factory.
pub fn allocate_message(host: Option<&ComPtr<IHostApplication>>) -> Option<ComPtr<IMessage>> {
    if let Some(host) = host {
        let mut cid: TUID = iid_of::<IMessage>();
        let mut iid: TUID = iid_of::<IMessage>();
        let mut obj: *mut c_void = std::ptr::null_mut();
        // SAFETY: cid/iid/obj are valid locals; host is a live IHostApplication.
        let result = unsafe { host.createInstance(&mut cid, &mut iid, &mut obj) };
        if result == kResultOk {
            // SAFETY: On success obj is an owned IMessage reference.
            if let Some(message) = unsafe { ComPtr::from_raw(obj as *mut IMessage) } {
                return Some(message);
            }
        }
    }
    ComWrapper::new(Message::new()).to_com_ptr::<IMessage>()
}

/// Allocate a message with `id` and, when given, a binary `path` attribute.
pub fn build_message(
    host: Option<&ComPtr<IHostApplication>>,
    id: &CStr,
    path: Option<&str>,
) -> Option<ComPtr<IMessage>> {
    let message = allocate_message(host)?;
    // SAFETY: message is live; id outlives the call and the message copies it.
    unsafe { message.setMessageID(id.as_ptr()) };
    if let Some(path) = path {
        // SAFETY: getAttributes returns a borrowed pointer valid while message lives.
        let attributes = unsafe { ComRef::from_raw(message.getAttributes()) }?;
        // SAFETY: The path bytes are valid for path.len() and copied by the list.
        let result = unsafe {
            attributes.setBinary(
                ATTR_PATH.as_ptr(),
                path.as_ptr() as *const c_void,
                path.len() as uint32,
            )
        };
        if result != kResultOk {
            return None;
        }
    }
    Some(message)
}

/// True when `message` carries `id`.
pub fn is_message(message: ComRef<'_, IMessage>, id: &CStr) -> bool {
    // SAFETY: message is live for the borrow.
    let actual = unsafe { message.getMessageID() };
    if actual.is_null() {
        return false;
    }
    // SAFETY: Non-null message ids are NUL-terminated.
    unsafe { CStr::from_ptr(actual) == id }
}

/// Read the `path` attribute.
///
/// A lookup that reports success but hands back a null data pointer is
/// treated the same as a missing attribute.
pub fn read_path(message: ComRef<'_, IMessage>) -> Option<String> {
    // SAFETY: message is live; getAttributes returns a borrowed pointer.
    let attributes = unsafe { ComRef::from_raw(message.getAttributes()) }?;
    let mut data: *const c_void = std::ptr::null();
    let mut size: uint32 = 0;
    // SAFETY: Out-parameters are valid locals.
    let result = unsafe { attributes.getBinary(ATTR_PATH.as_ptr(), &mut data, &mut size) };
    if result != kResultOk || data.is_null() {
        return None;
    }
    // SAFETY: On success data points to `size` bytes owned by the attribute list.
    let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, size as usize) };
    Some(String::from_utf8_lossy(bytes).into_owned())
}
