//! Message relay between the hosted component and the hosted controller.
//!
//! Each side is connected to a [`ConnectionProxy`] rather than to the other
//! side directly. A proxy forwards `notify` to its target until it is
//! disconnected, after which late notifications are refused instead of
//! reaching a torn-down object.

use parking_lot::Mutex;
use vst3::Steinberg::Vst::{IConnectionPoint, IConnectionPointTrait, IMessage};
use vst3::Steinberg::{kInvalidArgument, kResultFalse, kResultOk, tresult};
use vst3::{Class, ComPtr, ComWrapper};

use crate::util::retain;

/// `IConnectionPoint` that forwards notifications to a single target.
#[derive(Default)]
pub struct ConnectionProxy {
    target: Mutex<Option<ComPtr<IConnectionPoint>>>,
}

impl ConnectionProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a target is attached.
    pub fn is_connected(&self) -> bool {
        self.target.lock().is_some()
    }
}

impl Class for ConnectionProxy {
    type Interfaces = (IConnectionPoint,);
}

impl IConnectionPointTrait for ConnectionProxy {
    unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
        // SAFETY: other is null or a live connection point from the caller.
        let Some(other) = (unsafe { retain(other) }) else {
            return kInvalidArgument;
        };
        let mut target = self.target.lock();
        if target.is_some() {
            return kResultFalse;
        }
        *target = Some(other);
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        if self.target.lock().take().is_some() {
            kResultOk
        } else {
            kResultFalse
        }
    }

    unsafe fn notify(&self, message: *mut IMessage) -> tresult {
        // Released before forwarding so a reply can re-enter this proxy.
        let target = self.target.lock().clone();
        match target {
            // SAFETY: target is a retained connection point.
            Some(target) => unsafe { target.notify(message) },
            None => kResultFalse,
        }
    }
}

/// Bidirectional relay between a hosted component and a hosted controller.
pub struct HostedConnection {
    component: ComPtr<IConnectionPoint>,
    controller: ComPtr<IConnectionPoint>,
    to_controller: ComWrapper<ConnectionProxy>,
    to_component: ComWrapper<ConnectionProxy>,
}

impl HostedConnection {
    /// Connect both sides through fresh proxies.
    ///
    /// Returns `None` if the proxies cannot be attached.
    pub fn establish(
        component: ComPtr<IConnectionPoint>,
        controller: ComPtr<IConnectionPoint>,
    ) -> Option<Self> {
        let to_controller = ComWrapper::new(ConnectionProxy::new());
        let to_component = ComWrapper::new(ConnectionProxy::new());
        let to_controller_ptr = to_controller.to_com_ptr::<IConnectionPoint>()?;
        let to_component_ptr = to_component.to_com_ptr::<IConnectionPoint>()?;

        // SAFETY: All pointers are live, retained connection points.
        unsafe {
            if to_controller.connect(controller.as_ptr()) != kResultOk
                || to_component.connect(component.as_ptr()) != kResultOk
            {
                return None;
            }
            component.connect(to_controller_ptr.as_ptr());
            controller.connect(to_component_ptr.as_ptr());
        }

        Some(Self {
            component,
            controller,
            to_controller,
            to_component,
        })
    }

    /// Disconnect both sides and detach the proxies. Idempotent.
    pub fn close(&self) {
        let to_controller = self.to_controller.to_com_ptr::<IConnectionPoint>();
        let to_component = self.to_component.to_com_ptr::<IConnectionPoint>();
        // SAFETY: The hosted objects are retained until self drops.
        unsafe {
            if self.to_controller.is_connected() {
                if let Some(proxy) = &to_controller {
                    self.component.disconnect(proxy.as_ptr());
                }
                self.to_controller.disconnect(std::ptr::null_mut());
            }
            if self.to_component.is_connected() {
                if let Some(proxy) = &to_component {
                    self.controller.disconnect(proxy.as_ptr());
                }
                self.to_component.disconnect(std::ptr::null_mut());
            }
        }
    }
}

impl Drop for HostedConnection {
    fn drop(&mut self) {
        self.close();
    }
}
