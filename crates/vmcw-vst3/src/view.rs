//! IPlugView for the wrapper's editor.
//!
//! The host embeds a [`WrapperView`]. With nothing hosted it is a blank
//! placeholder of [`DEFAULT_VIEW_WIDTH`] x [`DEFAULT_VIEW_HEIGHT`]. Once the
//! hosted controller provides an editor, that editor is attached to the same
//! parent window and the wrapper view becomes its `IPlugFrame`, so resize
//! requests from the hosted editor reach the host with the wrapper view as
//! the target.
//!
//! The controller keeps a `Weak` link to the view's [`ViewCore`] and the view
//! keeps a `Weak` link back. Each side clears the other on teardown.

use std::ffi::{c_void, CStr, CString};
use std::ptr;
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use vmcw_core::config::{DEFAULT_VIEW_HEIGHT, DEFAULT_VIEW_WIDTH};
use vst3::Steinberg::*;
use vst3::{Class, ComPtr, ComWrapper};

use crate::controller::ControllerState;
use crate::util::{fid_eq, retain};

/// Window handle type accepted on this platform.
#[cfg(target_os = "windows")]
pub const NATIVE_PLATFORM: &str = "HWND";
#[cfg(target_os = "macos")]
pub const NATIVE_PLATFORM: &str = "NSView";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const NATIVE_PLATFORM: &str = "X11EmbedWindowID";

struct ViewState {
    parent: *mut c_void,
    platform: Option<CString>,
    attached: bool,
    width: int32,
    height: int32,
    host_frame: Option<ComPtr<IPlugFrame>>,
    hosted: Option<ComPtr<IPlugView>>,
    // Non-owning pointers into the WrapperView that owns this core.
    self_view: *mut IPlugView,
    self_frame: *mut IPlugFrame,
}

/// Shared part of a [`WrapperView`], reachable from the controller.
pub struct ViewCore {
    state: Mutex<ViewState>,
    owner: Mutex<Weak<ControllerState>>,
}

// SAFETY: View methods run on the UI thread; the controller only touches the
// core from lifecycle calls, which the host serializes with UI calls.
unsafe impl Send for ViewCore {}
// SAFETY: See the Send impl above.
unsafe impl Sync for ViewCore {}

impl ViewCore {
    fn new(owner: Weak<ControllerState>) -> Self {
        Self {
            state: Mutex::new(ViewState {
                parent: ptr::null_mut(),
                platform: None,
                attached: false,
                width: DEFAULT_VIEW_WIDTH,
                height: DEFAULT_VIEW_HEIGHT,
                host_frame: None,
                hosted: None,
                self_view: ptr::null_mut(),
                self_frame: ptr::null_mut(),
            }),
            owner: Mutex::new(owner),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    pub fn has_hosted_view(&self) -> bool {
        self.state.lock().hosted.is_some()
    }

    /// Current size as `(width, height)`.
    pub fn size(&self) -> (int32, int32) {
        let state = self.state.lock();
        (state.width, state.height)
    }

    fn hosted(&self) -> Option<ComPtr<IPlugView>> {
        self.state.lock().hosted.clone()
    }

    /// Show `view` in place of whatever is displayed now.
    ///
    /// The previous hosted editor, if any, is removed first. If the wrapper
    /// view is attached the new editor is attached to the same parent.
    pub fn switch_to_hosted_view(&self, view: ComPtr<IPlugView>) {
        let (old, attached, parent, platform, self_frame) = {
            let mut state = self.state.lock();
            let old = state.hosted.replace(view.clone());
            (old, state.attached, state.parent, state.platform.clone(), state.self_frame)
        };
        if let Some(old) = old {
            // SAFETY: old was retained while displayed.
            unsafe { detach_hosted(&old, attached) };
        }

        // SAFETY: view is a live editor; self_frame points into the owning
        // WrapperView, which outlives this call.
        unsafe {
            view.setFrame(self_frame);
            if attached {
                if let Some(platform) = &platform {
                    if view.attached(parent, platform.as_ptr()) != kResultOk {
                        warn!("Hosted editor refused to attach");
                    }
                }
            }
            let mut rect = ViewRect { left: 0, top: 0, right: 0, bottom: 0 };
            if view.getSize(&mut rect) == kResultOk {
                self.resize_to(rect.right - rect.left, rect.bottom - rect.top);
            }
        }
        debug!("Wrapper view now shows the hosted editor");
    }

    /// Remove the hosted editor and go back to the blank placeholder.
    pub fn switch_to_placeholder(&self) {
        let (old, attached) = {
            let mut state = self.state.lock();
            (state.hosted.take(), state.attached)
        };
        if let Some(old) = old {
            // SAFETY: old was retained while displayed.
            unsafe { detach_hosted(&old, attached) };
            self.resize_to(DEFAULT_VIEW_WIDTH, DEFAULT_VIEW_HEIGHT);
        }
    }

    /// Record a new size and ask the host frame to apply it.
    fn resize_to(&self, width: int32, height: int32) {
        let (frame, self_view, attached) = {
            let mut state = self.state.lock();
            if state.width == width && state.height == height {
                return;
            }
            state.width = width;
            state.height = height;
            (state.host_frame.clone(), state.self_view, state.attached)
        };
        if let (Some(frame), true) = (frame, attached) {
            let mut rect = ViewRect { left: 0, top: 0, right: width, bottom: height };
            // SAFETY: Retained frame; self_view is live while attached.
            unsafe { frame.resizeView(self_view, &mut rect) };
        }
    }

    /// Forget the controller. Called from the controller's teardown.
    pub(crate) fn detach_owner(&self) {
        *self.owner.lock() = Weak::new();
    }
}

unsafe fn detach_hosted(view: &ComPtr<IPlugView>, attached: bool) {
    // SAFETY: view is retained by the caller.
    unsafe {
        if attached {
            view.removed();
        }
        view.setFrame(ptr::null_mut());
    }
}

// =============================================================================
// WrapperView
// =============================================================================

/// The view object handed to the host.
pub struct WrapperView {
    core: Arc<ViewCore>,
}

impl WrapperView {
    /// Create a view with its self pointers wired up.
    pub fn create(owner: Weak<ControllerState>) -> Option<(ComPtr<IPlugView>, Arc<ViewCore>)> {
        let core = Arc::new(ViewCore::new(owner));
        let view = ComWrapper::new(WrapperView { core: Arc::clone(&core) });
        let view_ptr = view.to_com_ptr::<IPlugView>()?;
        let frame_ptr = view.as_com_ref::<IPlugFrame>()?.as_ptr();
        {
            let mut state = core.state.lock();
            state.self_view = view_ptr.as_ptr();
            state.self_frame = frame_ptr;
        }
        Some((view_ptr, core))
    }
}

impl Class for WrapperView {
    type Interfaces = (IPlugView, IPlugFrame);
}

impl IPlugViewTrait for WrapperView {
    unsafe fn isPlatformTypeSupported(&self, r#type: FIDString) -> tresult {
        // SAFETY: Null or a NUL-terminated host string.
        if !unsafe { fid_eq(r#type, NATIVE_PLATFORM) } {
            return kResultFalse;
        }
        match self.core.hosted() {
            // SAFETY: Retained hosted editor.
            Some(hosted) => unsafe { hosted.isPlatformTypeSupported(r#type) },
            None => kResultTrue,
        }
    }

    unsafe fn attached(&self, parent: *mut c_void, r#type: FIDString) -> tresult {
        // SAFETY: Forwarded host arguments.
        if unsafe { self.isPlatformTypeSupported(r#type) } != kResultTrue {
            return kResultFalse;
        }
        let (hosted, self_frame) = {
            let mut state = self.core.state.lock();
            if state.attached {
                return kResultFalse;
            }
            state.attached = true;
            state.parent = parent;
            // SAFETY: Checked above to match a known platform string.
            state.platform = Some(unsafe { CStr::from_ptr(r#type) }.to_owned());
            (state.hosted.clone(), state.self_frame)
        };
        if let Some(hosted) = hosted {
            // SAFETY: Retained editor; parent comes from the host.
            unsafe {
                hosted.setFrame(self_frame);
                return hosted.attached(parent, r#type);
            }
        }
        kResultOk
    }

    unsafe fn removed(&self) -> tresult {
        let hosted = {
            let mut state = self.core.state.lock();
            state.attached = false;
            state.parent = ptr::null_mut();
            state.hosted.clone()
        };
        if let Some(hosted) = hosted {
            // SAFETY: Retained editor.
            unsafe { detach_hosted(&hosted, true) };
        }
        kResultOk
    }

    unsafe fn onWheel(&self, distance: f32) -> tresult {
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.onWheel(distance) },
            None => kResultFalse,
        }
    }

    unsafe fn onKeyDown(&self, key: char16, key_code: int16, modifiers: int16) -> tresult {
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.onKeyDown(key, key_code, modifiers) },
            None => kResultFalse,
        }
    }

    unsafe fn onKeyUp(&self, key: char16, key_code: int16, modifiers: int16) -> tresult {
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.onKeyUp(key, key_code, modifiers) },
            None => kResultFalse,
        }
    }

    unsafe fn getSize(&self, size: *mut ViewRect) -> tresult {
        if size.is_null() {
            return kInvalidArgument;
        }
        if let Some(hosted) = self.core.hosted() {
            // SAFETY: size is non-null and host-owned.
            return unsafe { hosted.getSize(size) };
        }
        let (width, height) = self.core.size();
        // SAFETY: size is non-null (checked above) and host guarantees validity.
        let rect = unsafe { &mut *size };
        rect.left = 0;
        rect.top = 0;
        rect.right = width;
        rect.bottom = height;
        kResultOk
    }

    unsafe fn onSize(&self, new_size: *mut ViewRect) -> tresult {
        // SAFETY: Null or host-owned for the call.
        let Some(rect) = (unsafe { new_size.as_ref() }) else {
            return kInvalidArgument;
        };
        {
            let mut state = self.core.state.lock();
            state.width = (rect.right - rect.left).max(0);
            state.height = (rect.bottom - rect.top).max(0);
        }
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.onSize(new_size) },
            None => kResultOk,
        }
    }

    unsafe fn onFocus(&self, state: TBool) -> tresult {
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.onFocus(state) },
            None => kResultOk,
        }
    }

    unsafe fn setFrame(&self, frame: *mut IPlugFrame) -> tresult {
        // SAFETY: Null or a live host frame.
        self.core.state.lock().host_frame = unsafe { retain(frame) };
        kResultOk
    }

    unsafe fn canResize(&self) -> tresult {
        match self.core.hosted() {
            // SAFETY: Retained editor.
            Some(hosted) => unsafe { hosted.canResize() },
            None => kResultFalse,
        }
    }

    unsafe fn checkSizeConstraint(&self, rect: *mut ViewRect) -> tresult {
        if rect.is_null() {
            return kInvalidArgument;
        }
        if let Some(hosted) = self.core.hosted() {
            // SAFETY: rect is non-null and host-owned.
            return unsafe { hosted.checkSizeConstraint(rect) };
        }
        let (width, height) = self.core.size();
        // SAFETY: rect is non-null (checked above) and host guarantees validity.
        let r = unsafe { &mut *rect };
        r.right = r.left + width;
        r.bottom = r.top + height;
        kResultTrue
    }
}

impl IPlugFrameTrait for WrapperView {
    unsafe fn resizeView(&self, _view: *mut IPlugView, new_size: *mut ViewRect) -> tresult {
        // SAFETY: Null or owned by the hosted editor for the call.
        let Some(rect) = (unsafe { new_size.as_ref() }) else {
            return kInvalidArgument;
        };
        let (frame, self_view) = {
            let mut state = self.core.state.lock();
            state.width = rect.right - rect.left;
            state.height = rect.bottom - rect.top;
            (state.host_frame.clone(), state.self_view)
        };
        match frame {
            // SAFETY: Retained host frame; the wrapper view is the target the
            // host knows about.
            Some(frame) => unsafe { frame.resizeView(self_view, new_size) },
            None => kResultFalse,
        }
    }
}

impl Drop for WrapperView {
    fn drop(&mut self) {
        let (hosted, attached) = {
            let mut state = self.core.state.lock();
            state.host_frame = None;
            state.self_view = ptr::null_mut();
            state.self_frame = ptr::null_mut();
            (state.hosted.take(), state.attached)
        };
        if let Some(hosted) = hosted {
            // SAFETY: Retained editor.
            unsafe { detach_hosted(&hosted, attached) };
        }
        let owner = std::mem::take(&mut *self.core.owner.lock());
        if let Some(owner) = owner.upgrade() {
            owner.forget_view(&self.core);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockShared, MockView};

    /// Host frame recording `(view, width, height)` for each resize.
    #[derive(Default)]
    struct RecordingFrame {
        calls: Mutex<Vec<(usize, int32, int32)>>,
    }

    impl Class for RecordingFrame {
        type Interfaces = (IPlugFrame,);
    }

    impl IPlugFrameTrait for RecordingFrame {
        unsafe fn resizeView(&self, view: *mut IPlugView, new_size: *mut ViewRect) -> tresult {
            // SAFETY: Test callers pass a live rect.
            let rect = unsafe { &*new_size };
            self.calls
                .lock()
                .push((view as usize, rect.right - rect.left, rect.bottom - rect.top));
            kResultTrue
        }
    }

    fn native() -> CString {
        CString::new(NATIVE_PLATFORM).unwrap()
    }

    fn hosted_view(shared: &Arc<MockShared>) -> (ComWrapper<MockView>, ComPtr<IPlugView>) {
        let mock = ComWrapper::new(MockView::new(shared));
        let ptr = mock.to_com_ptr::<IPlugView>().unwrap();
        (mock, ptr)
    }

    #[test]
    fn test_placeholder_defaults() {
        let (view, core) = WrapperView::create(Weak::new()).unwrap();
        let mut rect = ViewRect { left: 0, top: 0, right: 0, bottom: 0 };
        let other = CString::new("Carbon").unwrap();

        // SAFETY: Local arguments.
        unsafe {
            assert_eq!(view.getSize(&mut rect), kResultOk);
            assert_eq!(view.isPlatformTypeSupported(native().as_ptr()), kResultTrue);
            assert_eq!(view.isPlatformTypeSupported(other.as_ptr()), kResultFalse);
            assert_eq!(view.canResize(), kResultFalse);
        }
        assert_eq!((rect.right, rect.bottom), (DEFAULT_VIEW_WIDTH, DEFAULT_VIEW_HEIGHT));
        assert!(!core.has_hosted_view());
    }

    #[test]
    fn test_swap_into_attached_view() {
        let shared = MockShared::new();
        let (view, core) = WrapperView::create(Weak::new()).unwrap();
        let platform = native();
        // SAFETY: Fake parent handle; the mock never dereferences it.
        unsafe { view.attached(0x1 as *mut c_void, platform.as_ptr()) };
        assert!(core.is_attached());

        let (_mock, hosted) = hosted_view(&shared);
        core.switch_to_hosted_view(hosted);
        assert_eq!(shared.events(), vec!["view.setFrame(set)", "view.attached"]);
        assert_eq!(core.size(), (640, 480));

        core.switch_to_placeholder();
        assert_eq!(
            shared.events_with("view.")[2..],
            ["view.removed".to_string(), "view.setFrame(null)".to_string()]
        );
        assert_eq!(core.size(), (DEFAULT_VIEW_WIDTH, DEFAULT_VIEW_HEIGHT));
    }

    #[test]
    fn test_hosted_view_attaches_with_wrapper() {
        let shared = MockShared::new();
        let (view, core) = WrapperView::create(Weak::new()).unwrap();
        let (_mock, hosted) = hosted_view(&shared);
        core.switch_to_hosted_view(hosted);
        assert_eq!(shared.events(), vec!["view.setFrame(set)"]);

        let platform = native();
        // SAFETY: Fake parent handle.
        unsafe {
            assert_eq!(view.attached(0x1 as *mut c_void, platform.as_ptr()), kResultOk);
            view.onKeyDown(0x41, 0, 0);
            view.removed();
        }
        assert_eq!(
            shared.events()[1..],
            [
                "view.setFrame(set)".to_string(),
                "view.attached".to_string(),
                "view.onKeyDown".to_string(),
                "view.removed".to_string(),
                "view.setFrame(null)".to_string(),
            ]
        );
    }

    #[test]
    fn test_hosted_resize_targets_wrapper_view() {
        let shared = MockShared::new();
        let (view, core) = WrapperView::create(Weak::new()).unwrap();
        let frame = ComWrapper::new(RecordingFrame::default());
        let platform = native();
        // SAFETY: Live frame; fake parent handle.
        unsafe {
            view.setFrame(frame.to_com_ptr::<IPlugFrame>().unwrap().as_ptr());
            view.attached(0x1 as *mut c_void, platform.as_ptr());
        }

        let (mock, hosted) = hosted_view(&shared);
        core.switch_to_hosted_view(hosted.clone());
        assert_eq!(*frame.calls.lock(), vec![(view.as_ptr() as usize, 640, 480)]);

        assert_eq!(mock.request_resize(hosted.as_ptr(), 800, 600), kResultTrue);
        assert_eq!(frame.calls.lock()[1], (view.as_ptr() as usize, 800, 600));
        assert_eq!(core.size(), (800, 600));
    }

    #[test]
    fn test_forwarding_without_hosted_view() {
        let (view, _core) = WrapperView::create(Weak::new()).unwrap();
        let mut rect = ViewRect { left: 10, top: 10, right: 2000, bottom: 2000 };
        // SAFETY: Local arguments.
        unsafe {
            assert_eq!(view.onWheel(1.0), kResultFalse);
            assert_eq!(view.onFocus(1), kResultOk);
            assert_eq!(view.checkSizeConstraint(&mut rect), kResultTrue);
        }
        assert_eq!((rect.right, rect.bottom), (10 + DEFAULT_VIEW_WIDTH, 10 + DEFAULT_VIEW_HEIGHT));
    }
}
