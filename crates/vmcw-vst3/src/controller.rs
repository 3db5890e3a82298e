//! Control-side wrapper identity.
//!
//! [`WrapperController`] is the edit controller the host sees. It owns the
//! hosted plugin's edit controller and is also that controller's component
//! handler: edits made in the hosted editor arrive here, are queued on the
//! registry, and reach the hosted processor on the next `process` call.
//!
//! The same state backs the control channel (`ChannelControl` in the
//! `channel` module), which reads parameters directly and routes
//! load/unload through the [`Dispatcher`] so lifecycle work runs on one
//! thread in FIFO order.
//!
//! ```text
//! McpServer ──> ChannelControl ──dispatch──> ControllerState::load_plugin
//!                                               │ LoadPlugin
//!                                               ▼
//!                                         WrapperProcessor
//! ```

use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use vmcw_core::state::read_header;
use vmcw_core::{Dispatcher, WrapperConfig};
#[cfg(feature = "control-channel")]
use vmcw_mcp::{McpServer, PluginControl};
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;
use vst3::{Class, ComPtr, ComRef, ComWrapper};

#[cfg(feature = "control-channel")]
use crate::channel::ChannelControl;
use crate::connection::HostedConnection;
use crate::error::LoadError;
use crate::message::{build_message, is_message, MSG_LOAD_PLUGIN, MSG_PLUGIN_LOADED, MSG_UNLOAD_PLUGIN};
use crate::module::HostedModule;
use crate::registry::HostedModuleRegistry;
use crate::stream::{MemoryStream, StreamReader};
use crate::util::{fid_eq, retain};
use crate::view::{ViewCore, WrapperView};

/// View name hosts ask for.
const EDITOR_VIEW: &CStr = c"editor";

// =============================================================================
// Shared state
// =============================================================================

#[derive(Default)]
struct HostedController {
    controller: Option<ComPtr<IEditController>>,
    connection: Option<HostedConnection>,
    single_component: bool,
    path: String,
    // Dropped after the COM objects above.
    module: Option<Arc<HostedModule>>,
}

/// State shared by the controller object, its edit bridge, its view and the
/// control channel.
pub struct ControllerState {
    registry: Arc<HostedModuleRegistry>,
    dispatcher: Dispatcher,
    host: Mutex<Option<ComPtr<IHostApplication>>>,
    host_handler: Mutex<Option<ComPtr<IComponentHandler>>>,
    peer: Mutex<Option<ComPtr<IConnectionPoint>>>,
    hosted: Mutex<HostedController>,
    // Serializes load/unload sequences from the host and the dispatcher.
    lifecycle: Mutex<()>,
    view: Mutex<Weak<ViewCore>>,
    bridge: ComWrapper<EditBridge>,
}

// SAFETY: Every COM pointer lives behind a lock and is cloned out before
// use. Lifecycle sequences are serialized by `lifecycle`.
unsafe impl Send for ControllerState {}
// SAFETY: See the Send impl above.
unsafe impl Sync for ControllerState {}

impl ControllerState {
    pub fn new(registry: Arc<HostedModuleRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            registry,
            dispatcher: Dispatcher::new("vmcw-dispatch"),
            host: Mutex::new(None),
            host_handler: Mutex::new(None),
            peer: Mutex::new(None),
            hosted: Mutex::new(HostedController::default()),
            lifecycle: Mutex::new(()),
            view: Mutex::new(Weak::new()),
            bridge: ComWrapper::new(EditBridge { owner: weak.clone() }),
        })
    }

    pub fn registry(&self) -> &Arc<HostedModuleRegistry> {
        &self.registry
    }

    /// Worker that runs load and unload requests from the control channel.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Counted handle to the hosted controller, taken under the lock.
    pub fn hosted_controller(&self) -> Option<ComPtr<IEditController>> {
        self.hosted.lock().controller.clone()
    }

    /// Path recorded by the last successful load, empty when none.
    pub fn loaded_path(&self) -> String {
        self.hosted.lock().path.clone()
    }

    pub fn is_single_component(&self) -> bool {
        self.hosted.lock().single_component
    }

    pub fn is_connected(&self) -> bool {
        self.hosted.lock().connection.is_some()
    }

    fn host_context(&self) -> *mut FUnknown {
        self.host
            .lock()
            .as_ref()
            .map(|h| h.as_ptr() as *mut FUnknown)
            .unwrap_or(ptr::null_mut())
    }

    fn bridge_ptr(&self) -> *mut IComponentHandler {
        self.bridge
            .as_com_ref::<IComponentHandler>()
            .map(|r| r.as_ptr())
            .unwrap_or(ptr::null_mut())
    }

    // -------------------------------------------------------------------------
    // Hosted controller lifecycle
    // -------------------------------------------------------------------------

    /// Create the hosted edit controller for the module in the registry.
    fn setup_hosted_controller(&self) -> Result<(), LoadError> {
        let module = self.registry.module().ok_or(LoadError::ControllerSetup)?;
        let context = self.host_context();

        if !self.registry.has_controller_class_id() {
            let effect = self.registry.effect_class_id().ok_or(LoadError::ControllerSetup)?;
            let component = module
                .create_instance::<IComponent>(&effect)
                .ok_or(LoadError::ControllerSetup)?;
            // SAFETY: Fresh instance; context is null or the retained host.
            if unsafe { component.initialize(context) } != kResultOk {
                return Err(LoadError::ControllerSetup);
            }

            let mut cid: TUID = [0; 16];
            // SAFETY: cid is a valid out-parameter.
            let reported = unsafe { component.getControllerClassId(&mut cid) } == kResultOk;
            if reported && cid != [0; 16] {
                self.registry.set_controller_class_id(cid);
                // SAFETY: Initialized above; only used for discovery.
                unsafe { component.terminate() };
            } else {
                let Some(controller) = component.cast::<IEditController>() else {
                    // SAFETY: Initialized above.
                    unsafe { component.terminate() };
                    return Err(LoadError::ControllerSetup);
                };
                info!("Hosted plugin is single-component");
                // SAFETY: Live controller; the bridge outlives it.
                unsafe { controller.setComponentHandler(self.bridge_ptr()) };
                let mut hosted = self.hosted.lock();
                hosted.controller = Some(controller);
                hosted.single_component = true;
                hosted.module = Some(module);
                // The processing object does not exist yet; PluginLoaded
                // triggers the connection.
                return Ok(());
            }
        }

        let cid = self
            .registry
            .controller_class_id()
            .ok_or(LoadError::ControllerSetup)?;
        let controller = module
            .create_instance::<IEditController>(&cid)
            .ok_or(LoadError::ControllerSetup)?;
        // SAFETY: Fresh instance; context is null or the retained host.
        if unsafe { controller.initialize(context) } != kResultOk {
            return Err(LoadError::ControllerSetup);
        }
        // SAFETY: Live controller; the bridge outlives it.
        unsafe { controller.setComponentHandler(self.bridge_ptr()) };
        {
            let mut hosted = self.hosted.lock();
            hosted.controller = Some(controller);
            hosted.single_component = false;
            hosted.module = Some(module);
        }
        self.connect_and_sync();
        Ok(())
    }

    /// Connect the hosted component and controller and copy the component's
    /// state into the controller. No-op until both exist or once connected.
    fn connect_and_sync(&self) {
        let Some(component) = self.registry.hosted_component() else {
            return;
        };
        let controller = {
            let hosted = self.hosted.lock();
            if hosted.connection.is_some() {
                return;
            }
            match &hosted.controller {
                Some(controller) => controller.clone(),
                None => return,
            }
        };

        let connection = match (
            component.cast::<IConnectionPoint>(),
            controller.cast::<IConnectionPoint>(),
        ) {
            (Some(component_cp), Some(controller_cp)) => {
                HostedConnection::establish(component_cp, controller_cp)
            }
            _ => None,
        };
        if connection.is_none() {
            debug!("Hosted plugin has no connection points");
        }
        {
            let mut hosted = self.hosted.lock();
            let still_current = hosted
                .controller
                .as_ref()
                .is_some_and(|c| c.as_ptr() == controller.as_ptr());
            if !still_current {
                return;
            }
            hosted.connection = connection;
        }

        let stream = ComWrapper::new(MemoryStream::new());
        let Some(stream_ptr) = stream.to_com_ptr::<IBStream>() else {
            return;
        };
        // SAFETY: Both hosted objects and the stream are retained.
        unsafe {
            if component.getState(stream_ptr.as_ptr()) == kResultOk {
                stream.rewind();
                controller.setComponentState(stream_ptr.as_ptr());
            }
        }
    }

    /// Release the hosted controller: placeholder view, close the
    /// connection, detach the handler, terminate.
    fn teardown_hosted_controller(&self) {
        self.switch_view_to_placeholder();
        let (controller, connection, module) = {
            let mut hosted = self.hosted.lock();
            let taken = (
                hosted.controller.take(),
                hosted.connection.take(),
                hosted.module.take(),
            );
            hosted.single_component = false;
            hosted.path.clear();
            taken
        };
        if let Some(connection) = connection {
            connection.close();
        }
        if let Some(controller) = controller {
            // SAFETY: Retained controller initialized during setup.
            unsafe {
                controller.setComponentHandler(ptr::null_mut());
                controller.terminate();
            }
            drop(controller);
            debug!("Hosted controller released");
        }
        drop(module);
    }

    /// Load `path` as the hosted plugin.
    ///
    /// On failure no hosted controller exists and no path is recorded.
    pub fn load_plugin(&self, path: &str) -> Result<(), LoadError> {
        let _lifecycle = self.lifecycle.lock();
        self.teardown_hosted_controller();

        self.registry.load(path)?;
        if let Err(e) = self.setup_hosted_controller() {
            error!("Failed to set up hosted controller for {path}: {e}");
            return Err(e);
        }

        self.send(MSG_LOAD_PLUGIN, Some(path));
        self.hosted.lock().path = path.to_string();
        self.show_hosted_editor();
        self.restart(RestartFlags_::kIoChanged);
        info!("Loaded {path}");
        Ok(())
    }

    /// Unload the hosted plugin on both sides.
    pub fn unload_plugin(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.teardown_hosted_controller();
        self.send(MSG_UNLOAD_PLUGIN, None);
        self.registry.unload();
        self.restart(RestartFlags_::kIoChanged);
        info!("Unloaded hosted plugin");
    }

    fn send(&self, id: &CStr, path: Option<&str>) {
        let peer = self.peer.lock().clone();
        let host = self.host.lock().clone();
        let Some(peer) = peer else {
            warn!("No processor connected; {} not delivered", id.to_string_lossy());
            return;
        };
        if let Some(message) = build_message(host.as_ref(), id, path) {
            // SAFETY: Retained peer and message. No lock is held.
            unsafe { peer.notify(message.as_ptr()) };
        }
    }

    fn restart(&self, flags: int32) -> tresult {
        let handler = self.host_handler.lock().clone();
        match handler {
            // SAFETY: Retained host handler.
            Some(handler) => unsafe { handler.restartComponent(flags) },
            None => kResultOk,
        }
    }

    // -------------------------------------------------------------------------
    // Edit callbacks from the hosted controller
    // -------------------------------------------------------------------------

    fn perform_edit(&self, id: ParamID, value: ParamValue) -> tresult {
        self.registry.push_param_change(id, value);
        kResultOk
    }

    // -------------------------------------------------------------------------
    // View link
    // -------------------------------------------------------------------------

    fn current_view(&self) -> Option<Arc<ViewCore>> {
        self.view.lock().upgrade()
    }

    /// Ask the hosted controller for its editor and show it.
    fn show_hosted_editor(&self) {
        let Some(view) = self.current_view() else {
            return;
        };
        if let Some(editor) = self.create_hosted_editor() {
            view.switch_to_hosted_view(editor);
        }
    }

    fn create_hosted_editor(&self) -> Option<ComPtr<IPlugView>> {
        let controller = self.hosted_controller()?;
        // SAFETY: Retained controller; createView returns an owned reference.
        unsafe { ComPtr::from_raw(controller.createView(EDITOR_VIEW.as_ptr())) }
    }

    fn switch_view_to_placeholder(&self) {
        if let Some(view) = self.current_view() {
            view.switch_to_placeholder();
        }
    }

    /// Drop the link to `core` if it is the current view.
    pub(crate) fn forget_view(&self, core: &Arc<ViewCore>) {
        let mut view = self.view.lock();
        if ptr::eq(view.as_ptr(), Arc::as_ptr(core)) {
            *view = Weak::new();
        }
    }

    fn clear_view_link(&self) {
        let view = mem::take(&mut *self.view.lock());
        if let Some(view) = view.upgrade() {
            view.switch_to_placeholder();
            view.detach_owner();
        }
    }
}

// =============================================================================
// EditBridge
// =============================================================================

/// Component handler given to the hosted controller.
///
/// Holds only a weak link so the hosted controller never keeps the wrapper
/// alive.
pub struct EditBridge {
    owner: Weak<ControllerState>,
}

impl Class for EditBridge {
    type Interfaces = (IComponentHandler,);
}

impl IComponentHandlerTrait for EditBridge {
    unsafe fn beginEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn performEdit(&self, id: ParamID, value_normalized: ParamValue) -> tresult {
        match self.owner.upgrade() {
            Some(owner) => owner.perform_edit(id, value_normalized),
            None => kResultFalse,
        }
    }

    unsafe fn endEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn restartComponent(&self, flags: int32) -> tresult {
        match self.owner.upgrade() {
            Some(owner) => owner.restart(flags),
            None => kResultOk,
        }
    }
}

// =============================================================================
// WrapperController
// =============================================================================

/// The wrapper's edit controller class.
pub struct WrapperController {
    config: &'static WrapperConfig,
    state: Arc<ControllerState>,
    #[cfg(feature = "control-channel")]
    server: Mutex<Option<McpServer>>,
}

impl WrapperController {
    pub fn new(config: &'static WrapperConfig, registry: Arc<HostedModuleRegistry>) -> Self {
        Self {
            config,
            state: ControllerState::new(registry),
            #[cfg(feature = "control-channel")]
            server: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<ControllerState> {
        &self.state
    }

    /// Address the control channel is listening on, if running.
    #[cfg(feature = "control-channel")]
    pub fn control_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.lock().as_ref().map(|s| s.local_addr())
    }

    #[cfg(feature = "control-channel")]
    fn start_control_channel(&self) {
        if !self.config.control_enabled() {
            info!("Control channel disabled by environment");
            return;
        }
        let control: Arc<dyn PluginControl> = Arc::new(ChannelControl::new(Arc::clone(&self.state)));
        match McpServer::start(control, self.config.control_host, self.config.effective_control_port()) {
            Ok(server) => *self.server.lock() = Some(server),
            Err(e) => error!("Failed to start control channel: {e}"),
        }
    }

    #[cfg(feature = "control-channel")]
    fn stop_control_channel(&self) {
        if let Some(mut server) = self.server.lock().take() {
            server.stop();
        }
    }

    #[cfg(not(feature = "control-channel"))]
    fn start_control_channel(&self) {
        debug!("{} built without the control channel", self.config.name);
    }

    #[cfg(not(feature = "control-channel"))]
    fn stop_control_channel(&self) {}
}

impl Class for WrapperController {
    type Interfaces = (IEditController, IConnectionPoint, IComponentHandler);
}

impl IPluginBaseTrait for WrapperController {
    unsafe fn initialize(&self, context: *mut FUnknown) -> tresult {
        // SAFETY: context is null or a live host object.
        let host = unsafe { retain(context) }.and_then(|c| c.cast::<IHostApplication>());
        *self.state.host.lock() = host;
        self.start_control_channel();
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.state.dispatcher.shutdown();
        self.stop_control_channel();
        {
            let _lifecycle = self.state.lifecycle.lock();
            self.state.teardown_hosted_controller();
        }
        self.state.clear_view_link();
        self.state.host_handler.lock().take();
        self.state.peer.lock().take();
        self.state.host.lock().take();
        kResultOk
    }
}

impl IEditControllerTrait for WrapperController {
    unsafe fn setComponentState(&self, state: *mut IBStream) -> tresult {
        // SAFETY: state is null or a live host stream.
        let Some(stream) = (unsafe { ComRef::from_raw(state) }) else {
            return kInvalidArgument;
        };
        let path = match read_header(&mut StreamReader::new(stream)) {
            Ok(path) => path,
            Err(e) => {
                debug!("Ignoring controller state: {e}");
                return kResultOk;
            }
        };

        if !path.is_empty() && path != self.state.loaded_path() {
            if let Err(e) = self.state.load_plugin(&path) {
                warn!("Controller state names {path}, which failed to load: {e}");
            }
        }

        if let Some(controller) = self.state.hosted_controller() {
            // SAFETY: Stream is positioned after the header.
            unsafe { controller.setComponentState(state) };
        }
        kResultOk
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        match self.state.hosted_controller() {
            // SAFETY: Retained controller; stream from the host.
            Some(controller) => unsafe { controller.setState(state) },
            None => kResultOk,
        }
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        match self.state.hosted_controller() {
            // SAFETY: Retained controller; stream from the host.
            Some(controller) => unsafe { controller.getState(state) },
            None => kResultOk,
        }
    }

    unsafe fn getParameterCount(&self) -> int32 {
        0
    }

    unsafe fn getParameterInfo(&self, _param_index: int32, _info: *mut ParameterInfo) -> tresult {
        kInvalidArgument
    }

    unsafe fn getParamStringByValue(
        &self,
        _id: ParamID,
        _value_normalized: ParamValue,
        _string: *mut String128,
    ) -> tresult {
        kResultFalse
    }

    unsafe fn getParamValueByString(
        &self,
        _id: ParamID,
        _string: *mut TChar,
        _value_normalized: *mut ParamValue,
    ) -> tresult {
        kResultFalse
    }

    unsafe fn normalizedParamToPlain(&self, _id: ParamID, value_normalized: ParamValue) -> ParamValue {
        value_normalized
    }

    unsafe fn plainParamToNormalized(&self, _id: ParamID, plain_value: ParamValue) -> ParamValue {
        plain_value
    }

    unsafe fn getParamNormalized(&self, _id: ParamID) -> ParamValue {
        0.0
    }

    unsafe fn setParamNormalized(&self, _id: ParamID, _value: ParamValue) -> tresult {
        kInvalidArgument
    }

    unsafe fn setComponentHandler(&self, handler: *mut IComponentHandler) -> tresult {
        // SAFETY: handler is null or a live host handler.
        *self.state.host_handler.lock() = unsafe { retain(handler) };
        kResultOk
    }

    unsafe fn createView(&self, name: FIDString) -> *mut IPlugView {
        // SAFETY: name is null or a NUL-terminated host string.
        if !unsafe { fid_eq(name, "editor") } {
            return ptr::null_mut();
        }
        let Some((view, core)) = WrapperView::create(Arc::downgrade(&self.state)) else {
            return ptr::null_mut();
        };
        if let Some(editor) = self.state.create_hosted_editor() {
            core.switch_to_hosted_view(editor);
        }
        *self.state.view.lock() = Arc::downgrade(&core);
        view.into_raw()
    }
}

impl IConnectionPointTrait for WrapperController {
    unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
        // SAFETY: other is null or a live connection point.
        let Some(other) = (unsafe { retain(other) }) else {
            return kInvalidArgument;
        };
        *self.state.peer.lock() = Some(other);
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        self.state.peer.lock().take();
        kResultOk
    }

    unsafe fn notify(&self, message: *mut IMessage) -> tresult {
        // SAFETY: message is null or live for the call.
        let Some(message) = (unsafe { ComRef::from_raw(message) }) else {
            return kInvalidArgument;
        };
        if is_message(message, MSG_PLUGIN_LOADED) {
            debug!("Controller received PluginLoaded");
            self.state.connect_and_sync();
            kResultOk
        } else {
            kResultFalse
        }
    }
}

impl IComponentHandlerTrait for WrapperController {
    unsafe fn beginEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn performEdit(&self, id: ParamID, value_normalized: ParamValue) -> tresult {
        self.state.perform_edit(id, value_normalized)
    }

    unsafe fn endEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn restartComponent(&self, flags: int32) -> tresult {
        self.state.restart(flags)
    }
}
