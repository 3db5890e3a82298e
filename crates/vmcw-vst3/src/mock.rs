//! In-process stand-ins for a hosted plugin and for the host side.
//!
//! Every mock records what it was asked to do into [`MockShared::events`] so
//! tests can assert call order across objects.

use std::ffi::{c_char, c_void, CStr};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;
use vst3::{Class, ComPtr, ComRef, ComWrapper};

use crate::controller::WrapperController;
use crate::message::read_path;
use crate::module::{HostedModule, AUDIO_EFFECT_CATEGORY, CONTROLLER_CATEGORY};
use crate::processor::WrapperProcessor;
use crate::registry::HostedModuleRegistry;
use crate::stream::StreamReader;
use crate::util::{copy_cstring, copy_wstring, retain};
use vmcw_core::WrapperConfig;

pub const EFFECT_CID: TUID = vst3::uid(0x1A2B3C4D, 0x11111111, 0x22222222, 0x33333333);
pub const CONTROLLER_CID: TUID = vst3::uid(0x5E6F7A8B, 0x44444444, 0x55555555, 0x66666666);

/// Output sample the mock processor writes, distinct from any passthrough.
pub const PROCESSED_SAMPLE: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct MockParam {
    pub id: u32,
    pub title: &'static str,
    pub units: &'static str,
    pub value: f64,
}

/// State shared by every mock object created from one [`MockFactory`].
pub struct MockShared {
    events: Mutex<Vec<String>>,
    pub params: Mutex<Vec<MockParam>>,
    /// Parameter changes seen by each `process` call.
    pub seen_changes: Mutex<Vec<Vec<(u32, Vec<(i32, f64)>)>>>,
    /// Address of each `inputParameterChanges` pointer `process` received.
    pub seen_change_ptrs: Mutex<Vec<usize>>,
    /// Bytes the component writes from `getState`.
    pub component_state: Mutex<Vec<u8>>,
    /// Bytes the component last received in `setState`.
    pub component_state_loaded: Mutex<Vec<u8>>,
    /// Bytes the controller last received in `setComponentState`.
    pub controller_component_state: Mutex<Vec<u8>>,
    /// Bytes the controller last received in `setState`.
    pub controller_state_loaded: Mutex<Vec<u8>>,
    single_component: AtomicBool,
    effect_listed: AtomicBool,
    process_result: AtomicI32,
}

impl MockShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            params: Mutex::new(vec![
                MockParam { id: 10, title: "Gain", units: "dB", value: 0.5 },
                MockParam { id: 11, title: "Mix", units: "%", value: 1.0 },
            ]),
            seen_changes: Mutex::new(Vec::new()),
            seen_change_ptrs: Mutex::new(Vec::new()),
            component_state: Mutex::new(b"hosted-state".to_vec()),
            component_state_loaded: Mutex::new(Vec::new()),
            controller_component_state: Mutex::new(Vec::new()),
            controller_state_loaded: Mutex::new(Vec::new()),
            single_component: AtomicBool::new(false),
            effect_listed: AtomicBool::new(true),
            process_result: AtomicI32::new(kResultOk),
        })
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Recorded events starting with `prefix`.
    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Make the component report no controller class.
    pub fn set_single_component(&self, single: bool) {
        self.single_component.store(single, Ordering::Relaxed);
    }

    /// List (or hide) the audio effect class in the factory.
    pub fn set_effect_class_listed(&self, listed: bool) {
        self.effect_listed.store(listed, Ordering::Relaxed);
    }

    pub fn set_process_result(&self, result: tresult) {
        self.process_result.store(result, Ordering::Relaxed);
    }

    pub fn param_value(&self, id: u32) -> Option<f64> {
        self.params.lock().iter().find(|p| p.id == id).map(|p| p.value)
    }
}

/// A [`HostedModule`] backed by a [`MockFactory`].
pub fn mock_module(shared: &Arc<MockShared>, path: &str) -> HostedModule {
    let factory = ComWrapper::new(MockFactory { shared: Arc::clone(shared) });
    let factory = factory
        .to_com_ptr::<IPluginFactory>()
        .expect("mock factory exposes IPluginFactory");
    HostedModule::from_factory(factory, path)
}

/// Read everything left in `stream`.
///
/// # Safety
///
/// `stream` must be null or a live `IBStream`.
pub unsafe fn read_all(stream: *mut IBStream) -> Vec<u8> {
    let mut bytes = Vec::new();
    // SAFETY: Null or live per caller contract.
    if let Some(stream) = unsafe { ComRef::from_raw(stream) } {
        let _ = StreamReader::new(stream).read_to_end(&mut bytes);
    }
    bytes
}

unsafe fn read_changes(changes: *mut IParameterChanges) -> Vec<(u32, Vec<(i32, f64)>)> {
    let mut seen = Vec::new();
    // SAFETY: Null or live for the process call.
    let Some(changes) = (unsafe { ComRef::from_raw(changes) }) else {
        return seen;
    };
    // SAFETY: The change set is live for the process call.
    unsafe {
        for i in 0..changes.getParameterCount() {
            let Some(queue) = ComRef::from_raw(changes.getParameterData(i)) else {
                continue;
            };
            let mut points = Vec::new();
            for p in 0..queue.getPointCount() {
                let (mut offset, mut value) = (0, 0.0);
                queue.getPoint(p, &mut offset, &mut value);
                points.push((offset, value));
            }
            seen.push((queue.getParameterId(), points));
        }
    }
    seen
}

// =============================================================================
// Factory
// =============================================================================

pub struct MockFactory {
    shared: Arc<MockShared>,
}

impl Class for MockFactory {
    type Interfaces = (IPluginFactory,);
}

impl IPluginFactoryTrait for MockFactory {
    unsafe fn getFactoryInfo(&self, info: *mut PFactoryInfo) -> tresult {
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        copy_cstring("Mock Vendor", unsafe { &mut (*info).vendor });
        kResultOk
    }

    unsafe fn countClasses(&self) -> int32 {
        2
    }

    unsafe fn getClassInfo(&self, index: int32, info: *mut PClassInfo) -> tresult {
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        let info = unsafe { &mut *info };
        let (cid, category, name) = match index {
            0 if self.shared.effect_listed.load(Ordering::Relaxed) => {
                (EFFECT_CID, AUDIO_EFFECT_CATEGORY, "Mock Gain")
            }
            0 => (EFFECT_CID, "Mock Service Class", "Mock Service"),
            1 => (CONTROLLER_CID, CONTROLLER_CATEGORY, "Mock Gain Controller"),
            _ => return kInvalidArgument,
        };
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_cstring(category, &mut info.category);
        copy_cstring(name, &mut info.name);
        kResultOk
    }

    unsafe fn createInstance(&self, cid: FIDString, iid: FIDString, obj: *mut *mut c_void) -> tresult {
        // SAFETY: Callers pass 16-byte class ids.
        let cid = unsafe { &*(cid as *const TUID) };
        let unknown = if cid == &EFFECT_CID {
            self.shared.record("factory.create(component)");
            ComWrapper::new(MockComponent::new(&self.shared)).to_com_ptr::<FUnknown>()
        } else if cid == &CONTROLLER_CID {
            self.shared.record("factory.create(controller)");
            ComWrapper::new(MockController::new(&self.shared)).to_com_ptr::<FUnknown>()
        } else {
            return kInvalidArgument;
        };
        let Some(unknown) = unknown else {
            return kNoInterface;
        };
        let ptr = unknown.as_ptr();
        // SAFETY: ptr is a live FUnknown; iid and obj come from the caller.
        unsafe { ((*(*ptr).vtbl).queryInterface)(ptr, iid as *const TUID, obj) }
    }
}

// =============================================================================
// Edit controller surface shared by both mock objects
// =============================================================================

macro_rules! mock_edit_controller {
    ($ty:ty, $role:literal) => {
        impl IEditControllerTrait for $ty {
            unsafe fn setComponentState(&self, state: *mut IBStream) -> tresult {
                // SAFETY: Host streams are live for the call.
                let bytes = unsafe { read_all(state) };
                self.shared
                    .record(format!("{}.setComponentState({})", $role, bytes.len()));
                *self.shared.controller_component_state.lock() = bytes;
                kResultOk
            }

            unsafe fn setState(&self, state: *mut IBStream) -> tresult {
                // SAFETY: Host streams are live for the call.
                let bytes = unsafe { read_all(state) };
                self.shared.record(format!("{}.setState({})", $role, bytes.len()));
                *self.shared.controller_state_loaded.lock() = bytes;
                kResultOk
            }

            unsafe fn getState(&self, _state: *mut IBStream) -> tresult {
                kResultOk
            }

            unsafe fn getParameterCount(&self) -> int32 {
                self.shared.params.lock().len() as int32
            }

            unsafe fn getParameterInfo(&self, index: int32, info: *mut ParameterInfo) -> tresult {
                if info.is_null() {
                    return kInvalidArgument;
                }
                let params = self.shared.params.lock();
                let Some(param) = usize::try_from(index).ok().and_then(|i| params.get(i)) else {
                    return kInvalidArgument;
                };
                // SAFETY: Checked non-null.
                let info = unsafe { &mut *info };
                info.id = param.id;
                copy_wstring(param.title, &mut info.title);
                copy_wstring(param.title, &mut info.shortTitle);
                copy_wstring(param.units, &mut info.units);
                info.stepCount = 0;
                info.defaultNormalizedValue = 0.5;
                info.unitId = 0;
                info.flags = ParameterInfo_::ParameterFlags_::kCanAutomate;
                kResultOk
            }

            unsafe fn getParamStringByValue(
                &self,
                _id: ParamID,
                value: ParamValue,
                string: *mut String128,
            ) -> tresult {
                if string.is_null() {
                    return kInvalidArgument;
                }
                // SAFETY: Checked non-null.
                copy_wstring(&format!("{value:.2}"), unsafe { &mut *string });
                kResultOk
            }

            unsafe fn getParamValueByString(
                &self,
                _id: ParamID,
                _string: *mut TChar,
                _value: *mut ParamValue,
            ) -> tresult {
                kNotImplemented
            }

            unsafe fn normalizedParamToPlain(&self, _id: ParamID, value: ParamValue) -> ParamValue {
                value
            }

            unsafe fn plainParamToNormalized(&self, _id: ParamID, value: ParamValue) -> ParamValue {
                value
            }

            unsafe fn getParamNormalized(&self, id: ParamID) -> ParamValue {
                self.shared.param_value(id).unwrap_or(0.0)
            }

            unsafe fn setParamNormalized(&self, id: ParamID, value: ParamValue) -> tresult {
                self.shared
                    .record(format!("{}.setParamNormalized({id},{value})", $role));
                let mut params = self.shared.params.lock();
                match params.iter_mut().find(|p| p.id == id) {
                    Some(param) => {
                        param.value = value;
                        kResultOk
                    }
                    None => kInvalidArgument,
                }
            }

            unsafe fn setComponentHandler(&self, handler: *mut IComponentHandler) -> tresult {
                let state = if handler.is_null() { "null" } else { "set" };
                self.shared
                    .record(format!("{}.setComponentHandler({state})", $role));
                // SAFETY: Null or live per the ABI.
                *self.handler.lock() = unsafe { retain(handler) };
                kResultOk
            }

            unsafe fn createView(&self, _name: FIDString) -> *mut IPlugView {
                self.shared.record(format!("{}.createView", $role));
                ComWrapper::new(MockView::new(&self.shared))
                    .to_com_ptr::<IPlugView>()
                    .map(|view| view.into_raw())
                    .unwrap_or(std::ptr::null_mut())
            }
        }

        impl IConnectionPointTrait for $ty {
            unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
                self.shared.record(format!("{}.connect", $role));
                // SAFETY: Null or live per the ABI.
                *self.peer.lock() = unsafe { retain(other) };
                kResultOk
            }

            unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
                self.shared.record(format!("{}.disconnect", $role));
                self.peer.lock().take();
                kResultOk
            }

            unsafe fn notify(&self, _message: *mut IMessage) -> tresult {
                self.shared.record(format!("{}.notify", $role));
                kResultOk
            }
        }

        impl $ty {
            /// The component handler installed on this object.
            pub fn handler(&self) -> Option<ComPtr<IComponentHandler>> {
                self.handler.lock().clone()
            }

            /// Send `message` to whatever this object is connected to.
            pub fn send(&self, message: &ComPtr<IMessage>) -> tresult {
                let peer = self.peer.lock().clone();
                match peer {
                    // SAFETY: Retained peer and live message.
                    Some(peer) => unsafe { peer.notify(message.as_ptr()) },
                    None => kResultFalse,
                }
            }
        }
    };
}

// =============================================================================
// Component (processing side; also a controller when single-component)
// =============================================================================

pub struct MockComponent {
    shared: Arc<MockShared>,
    handler: Mutex<Option<ComPtr<IComponentHandler>>>,
    peer: Mutex<Option<ComPtr<IConnectionPoint>>>,
}

impl MockComponent {
    pub fn new(shared: &Arc<MockShared>) -> Self {
        Self {
            shared: Arc::clone(shared),
            handler: Mutex::new(None),
            peer: Mutex::new(None),
        }
    }
}

impl Class for MockComponent {
    type Interfaces = (IComponent, IAudioProcessor, IConnectionPoint, IEditController);
}

impl IPluginBaseTrait for MockComponent {
    unsafe fn initialize(&self, _context: *mut FUnknown) -> tresult {
        self.shared.record("component.initialize");
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.shared.record("component.terminate");
        kResultOk
    }
}

impl IComponentTrait for MockComponent {
    unsafe fn getControllerClassId(&self, class_id: *mut TUID) -> tresult {
        if class_id.is_null() {
            return kInvalidArgument;
        }
        if self.shared.single_component.load(Ordering::Relaxed) {
            return kResultFalse;
        }
        // SAFETY: Checked non-null.
        unsafe { *class_id = CONTROLLER_CID };
        kResultOk
    }

    unsafe fn setIoMode(&self, _mode: IoMode) -> tresult {
        kResultOk
    }

    unsafe fn getBusCount(&self, media_type: MediaType, dir: BusDirection) -> int32 {
        match (media_type as MediaTypes, dir as BusDirections) {
            // Main input plus a sidechain.
            (MediaTypes_::kAudio, BusDirections_::kInput) => 2,
            (MediaTypes_::kAudio, BusDirections_::kOutput) => 1,
            (MediaTypes_::kEvent, BusDirections_::kInput) => 1,
            _ => 0,
        }
    }

    unsafe fn getBusInfo(
        &self,
        _media_type: MediaType,
        _dir: BusDirection,
        _index: int32,
        _bus: *mut BusInfo,
    ) -> tresult {
        kResultOk
    }

    unsafe fn getRoutingInfo(&self, _in_info: *mut RoutingInfo, _out_info: *mut RoutingInfo) -> tresult {
        kNotImplemented
    }

    unsafe fn activateBus(
        &self,
        media_type: MediaType,
        dir: BusDirection,
        index: int32,
        state: TBool,
    ) -> tresult {
        let kind = if media_type as MediaTypes == MediaTypes_::kAudio { "audio" } else { "event" };
        let dir = if dir as BusDirections == BusDirections_::kInput { "in" } else { "out" };
        self.shared
            .record(format!("component.activateBus({kind},{dir},{index},{state})"));
        kResultOk
    }

    unsafe fn setActive(&self, state: TBool) -> tresult {
        self.shared.record(format!("component.setActive({state})"));
        kResultOk
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        // SAFETY: Host streams are live for the call.
        let bytes = unsafe { read_all(state) };
        self.shared.record(format!("component.setState({})", bytes.len()));
        *self.shared.component_state_loaded.lock() = bytes;
        kResultOk
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        // SAFETY: Host streams are live for the call.
        let Some(stream) = (unsafe { ComRef::from_raw(state) }) else {
            return kInvalidArgument;
        };
        let mut bytes = self.shared.component_state.lock().clone();
        let mut written = 0;
        // SAFETY: bytes outlives the call.
        unsafe {
            stream.write(
                bytes.as_mut_ptr() as *mut c_void,
                bytes.len() as int32,
                &mut written,
            )
        }
    }
}

impl IAudioProcessorTrait for MockComponent {
    unsafe fn setBusArrangements(
        &self,
        _inputs: *mut SpeakerArrangement,
        num_ins: int32,
        _outputs: *mut SpeakerArrangement,
        num_outs: int32,
    ) -> tresult {
        self.shared
            .record(format!("component.setBusArrangements({num_ins},{num_outs})"));
        kResultTrue
    }

    unsafe fn getBusArrangement(
        &self,
        _dir: BusDirection,
        _index: int32,
        arr: *mut SpeakerArrangement,
    ) -> tresult {
        if arr.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        unsafe { *arr = SpeakerArr::kStereo };
        kResultOk
    }

    unsafe fn canProcessSampleSize(&self, _symbolic_sample_size: int32) -> tresult {
        kResultTrue
    }

    unsafe fn getLatencySamples(&self) -> uint32 {
        64
    }

    unsafe fn setupProcessing(&self, setup: *mut ProcessSetup) -> tresult {
        // SAFETY: Null or live per the ABI.
        let rate = unsafe { setup.as_ref() }.map(|s| s.sampleRate).unwrap_or(0.0);
        self.shared.record(format!("component.setupProcessing({rate})"));
        kResultOk
    }

    unsafe fn setProcessing(&self, state: TBool) -> tresult {
        self.shared.record(format!("component.setProcessing({state})"));
        kResultOk
    }

    unsafe fn process(&self, data: *mut ProcessData) -> tresult {
        // SAFETY: The wrapper passes a live ProcessData.
        let Some(data) = (unsafe { data.as_ref() }) else {
            return kInvalidArgument;
        };
        self.shared.record(format!("component.process({})", data.numSamples));
        self.shared
            .seen_change_ptrs
            .lock()
            .push(data.inputParameterChanges as usize);
        // SAFETY: Change set is live for the call.
        let seen = unsafe { read_changes(data.inputParameterChanges) };
        self.shared.seen_changes.lock().push(seen);

        if data.symbolicSampleSize == SymbolicSampleSizes_::kSample32 as int32
            && data.numOutputs > 0
            && !data.outputs.is_null()
        {
            // SAFETY: Buffers are valid for numSamples per the ABI.
            unsafe {
                let bus = &*data.outputs;
                for ch in 0..bus.numChannels.max(0) as usize {
                    let channel = *bus.__field0.channelBuffers32.add(ch);
                    for i in 0..data.numSamples.max(0) as usize {
                        *channel.add(i) = PROCESSED_SAMPLE;
                    }
                }
            }
        }
        self.shared.process_result.load(Ordering::Relaxed)
    }

    unsafe fn getTailSamples(&self) -> uint32 {
        128
    }
}

mock_edit_controller!(MockComponent, "component");

// =============================================================================
// Separate controller
// =============================================================================

pub struct MockController {
    shared: Arc<MockShared>,
    handler: Mutex<Option<ComPtr<IComponentHandler>>>,
    peer: Mutex<Option<ComPtr<IConnectionPoint>>>,
}

impl MockController {
    pub fn new(shared: &Arc<MockShared>) -> Self {
        Self {
            shared: Arc::clone(shared),
            handler: Mutex::new(None),
            peer: Mutex::new(None),
        }
    }
}

impl Class for MockController {
    type Interfaces = (IEditController, IConnectionPoint);
}

impl IPluginBaseTrait for MockController {
    unsafe fn initialize(&self, _context: *mut FUnknown) -> tresult {
        self.shared.record("controller.initialize");
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.shared.record("controller.terminate");
        kResultOk
    }
}

mock_edit_controller!(MockController, "controller");

// =============================================================================
// Hosted editor view
// =============================================================================

pub struct MockView {
    shared: Arc<MockShared>,
    frame: Mutex<*mut IPlugFrame>,
}

impl MockView {
    pub fn new(shared: &Arc<MockShared>) -> Self {
        Self {
            shared: Arc::clone(shared),
            frame: Mutex::new(std::ptr::null_mut()),
        }
    }

    /// Ask the frame this view was given to resize it.
    pub fn request_resize(&self, this: *mut IPlugView, width: int32, height: int32) -> tresult {
        let frame = *self.frame.lock();
        // SAFETY: The frame outlives the view while it is set.
        let Some(frame) = (unsafe { ComRef::from_raw(frame) }) else {
            return kResultFalse;
        };
        let mut rect = ViewRect { left: 0, top: 0, right: width, bottom: height };
        // SAFETY: rect is a valid local.
        unsafe { frame.resizeView(this, &mut rect) }
    }
}

impl Class for MockView {
    type Interfaces = (IPlugView,);
}

impl IPlugViewTrait for MockView {
    unsafe fn isPlatformTypeSupported(&self, _type: FIDString) -> tresult {
        kResultTrue
    }

    unsafe fn attached(&self, _parent: *mut c_void, _type: FIDString) -> tresult {
        self.shared.record("view.attached");
        kResultOk
    }

    unsafe fn removed(&self) -> tresult {
        self.shared.record("view.removed");
        kResultOk
    }

    unsafe fn onWheel(&self, _distance: f32) -> tresult {
        kResultOk
    }

    unsafe fn onKeyDown(&self, _key: char16, _key_code: int16, _modifiers: int16) -> tresult {
        self.shared.record("view.onKeyDown");
        kResultOk
    }

    unsafe fn onKeyUp(&self, _key: char16, _key_code: int16, _modifiers: int16) -> tresult {
        kResultOk
    }

    unsafe fn getSize(&self, size: *mut ViewRect) -> tresult {
        if size.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        unsafe { *size = ViewRect { left: 0, top: 0, right: 640, bottom: 480 } };
        kResultOk
    }

    unsafe fn onSize(&self, new_size: *mut ViewRect) -> tresult {
        // SAFETY: Null or live per the ABI.
        if let Some(rect) = unsafe { new_size.as_ref() } {
            self.shared
                .record(format!("view.onSize({},{})", rect.right - rect.left, rect.bottom - rect.top));
        }
        kResultOk
    }

    unsafe fn onFocus(&self, _state: TBool) -> tresult {
        kResultOk
    }

    unsafe fn setFrame(&self, frame: *mut IPlugFrame) -> tresult {
        let state = if frame.is_null() { "null" } else { "set" };
        self.shared.record(format!("view.setFrame({state})"));
        *self.frame.lock() = frame;
        kResultOk
    }

    unsafe fn canResize(&self) -> tresult {
        kResultTrue
    }

    unsafe fn checkSizeConstraint(&self, _rect: *mut ViewRect) -> tresult {
        kResultTrue
    }
}

// =============================================================================
// Host side
// =============================================================================

/// Host component handler recording every callback.
#[derive(Default)]
pub struct MockHostHandler {
    pub events: Mutex<Vec<String>>,
}

impl Class for MockHostHandler {
    type Interfaces = (IComponentHandler,);
}

impl IComponentHandlerTrait for MockHostHandler {
    unsafe fn beginEdit(&self, id: ParamID) -> tresult {
        self.events.lock().push(format!("beginEdit({id})"));
        kResultOk
    }

    unsafe fn performEdit(&self, id: ParamID, value: ParamValue) -> tresult {
        self.events.lock().push(format!("performEdit({id},{value})"));
        kResultOk
    }

    unsafe fn endEdit(&self, id: ParamID) -> tresult {
        self.events.lock().push(format!("endEdit({id})"));
        kResultOk
    }

    unsafe fn restartComponent(&self, flags: int32) -> tresult {
        self.events.lock().push(format!("restartComponent({flags})"));
        kResultOk
    }
}

/// Connection peer recording `(message id, path attribute)` pairs.
#[derive(Default)]
pub struct MockPeer {
    pub received: Mutex<Vec<(String, Option<String>)>>,
}

impl Class for MockPeer {
    type Interfaces = (IConnectionPoint,);
}

impl IConnectionPointTrait for MockPeer {
    unsafe fn connect(&self, _other: *mut IConnectionPoint) -> tresult {
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        kResultOk
    }

    unsafe fn notify(&self, message: *mut IMessage) -> tresult {
        // SAFETY: Messages are live for the call.
        let Some(message) = (unsafe { ComRef::from_raw(message) }) else {
            return kInvalidArgument;
        };
        // SAFETY: The message is live.
        let id = unsafe { message.getMessageID() };
        let id = if id.is_null() {
            String::new()
        } else {
            // SAFETY: Message ids are NUL-terminated.
            unsafe { CStr::from_ptr(id as *const c_char) }
                .to_string_lossy()
                .into_owned()
        };
        self.received.lock().push((id, read_path(message)));
        kResultOk
    }
}

// =============================================================================
// Wired wrapper pair
// =============================================================================

pub static TEST_CONFIG: WrapperConfig = WrapperConfig::new("Test Wrapper").with_control_port(0);

/// Path the mock module is registered under.
pub const PATH: &str = "/plugins/Gain.vst3";

pub struct Pair {
    pub registry: Arc<HostedModuleRegistry>,
    pub controller: ComWrapper<WrapperController>,
    pub processor: ComWrapper<WrapperProcessor>,
}

/// Controller and processor wired to each other over a preloaded
/// registry, as a host would connect them.
pub fn pair(shared: &Arc<MockShared>) -> Pair {
    let registry = Arc::new(HostedModuleRegistry::new());
    registry
        .load_with(PATH, |p| Ok(mock_module(shared, p)))
        .expect("mock module loads");
    let controller = ComWrapper::new(WrapperController::new(&TEST_CONFIG, Arc::clone(&registry)));
    let processor = ComWrapper::new(WrapperProcessor::new(&TEST_CONFIG, Arc::clone(&registry)));
    let controller_cp = controller
        .to_com_ptr::<IConnectionPoint>()
        .expect("controller exposes IConnectionPoint");
    let processor_cp = processor
        .to_com_ptr::<IConnectionPoint>()
        .expect("processor exposes IConnectionPoint");
    // SAFETY: Both objects are live.
    unsafe {
        controller.connect(processor_cp.as_ptr());
        processor.connect(controller_cp.as_ptr());
    }
    Pair { registry, controller, processor }
}
