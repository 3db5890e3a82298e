//! Audio-side wrapper identity.
//!
//! [`WrapperProcessor`] is the object the host sees as the effect. It owns
//! the hosted plugin's processing object, created in response to the
//! `LoadPlugin` message from the controller identity, and forwards every
//! lifecycle call to it. With nothing hosted (or while a swap is in
//! progress) audio is passed through.
//!
//! # Locking
//!
//! `wrapper` (what the host told us) is always taken before `hosted` (what
//! has been propagated to the hosted object). `process` only ever
//! `try_lock`s `hosted` and passes audio through when it is contended.
//!
//! # Replay
//!
//! The host may activate the wrapper before anything is loaded, or swap the
//! plugin while active. After every load the stored bus arrangement and
//! process setup are replayed, then `setActive(true)` if the wrapper is
//! active, then `setProcessing(true)` if it is processing.

use std::ptr;
use std::slice;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use vmcw_core::state::{read_header, write_header};
use vmcw_core::{ParamChange, WrapperConfig};
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;
use vst3::{Class, ComPtr, ComRef, ComWrapper};

use crate::error::LoadError;
use crate::message::{build_message, is_message, read_path, MSG_LOAD_PLUGIN, MSG_PLUGIN_LOADED, MSG_UNLOAD_PLUGIN};
use crate::module::HostedModule;
use crate::param_changes::MergedParameterChanges;
use crate::registry::HostedModuleRegistry;
use crate::stream::{StreamReader, StreamWriter};
use crate::util::{class_id, copy_wstring, retain};

// =============================================================================
// State
// =============================================================================

/// `ProcessSetup` fields kept for replay.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SetupSnapshot {
    process_mode: int32,
    symbolic_sample_size: int32,
    max_samples_per_block: int32,
    sample_rate: f64,
}

impl SetupSnapshot {
    fn to_setup(self) -> ProcessSetup {
        ProcessSetup {
            processMode: self.process_mode,
            symbolicSampleSize: self.symbolic_sample_size,
            maxSamplesPerBlock: self.max_samples_per_block,
            sampleRate: self.sample_rate,
        }
    }
}

/// What the real host has told the wrapper.
#[derive(Default)]
struct WrapperState {
    active: bool,
    processing: bool,
    setup: Option<SetupSnapshot>,
    arrangements: Option<(Vec<SpeakerArrangement>, Vec<SpeakerArrangement>)>,
}

/// The hosted processing object and what has been propagated to it.
struct HostedSide {
    component: Option<ComPtr<IComponent>>,
    processor: Option<ComPtr<IAudioProcessor>>,
    active: bool,
    processing: bool,
    ready: bool,
    path: String,
    scratch: Vec<ParamChange>,
    merged: ComWrapper<MergedParameterChanges>,
    // Dropped after the COM objects above.
    module: Option<Arc<HostedModule>>,
}

impl HostedSide {
    fn new() -> Self {
        Self {
            component: None,
            processor: None,
            active: false,
            processing: false,
            ready: false,
            path: String::new(),
            scratch: Vec::with_capacity(vmcw_core::config::MAX_PENDING_PARAM_CHANGES),
            merged: ComWrapper::new(MergedParameterChanges::new()),
            module: None,
        }
    }
}

// =============================================================================
// WrapperProcessor
// =============================================================================

/// The wrapper's audio effect class.
pub struct WrapperProcessor {
    config: &'static WrapperConfig,
    registry: Arc<HostedModuleRegistry>,
    host: Mutex<Option<ComPtr<IHostApplication>>>,
    peer: Mutex<Option<ComPtr<IConnectionPoint>>>,
    wrapper: Mutex<WrapperState>,
    hosted: Mutex<HostedSide>,
}

impl WrapperProcessor {
    pub fn new(config: &'static WrapperConfig, registry: Arc<HostedModuleRegistry>) -> Self {
        Self {
            config,
            registry,
            host: Mutex::new(None),
            peer: Mutex::new(None),
            wrapper: Mutex::new(WrapperState::default()),
            hosted: Mutex::new(HostedSide::new()),
        }
    }

    /// True once a hosted processor is installed and replayed.
    pub fn is_ready(&self) -> bool {
        self.hosted.lock().ready
    }

    /// Path of the hosted plugin, empty when none.
    pub fn loaded_path(&self) -> String {
        self.hosted.lock().path.clone()
    }

    /// Create, initialize and install the hosted processing object for
    /// `path`, then replay the wrapper's host state onto it.
    ///
    /// Leaves the passthrough state untouched on failure.
    pub fn load(&self, path: &str) -> Result<(), LoadError> {
        self.registry.load(path)?;
        let module = self
            .registry
            .module()
            .ok_or(LoadError::ComponentSetup("module not loaded"))?;
        let cid = self
            .registry
            .effect_class_id()
            .ok_or(LoadError::ComponentSetup("no effect class"))?;

        let component = module
            .create_instance::<IComponent>(&cid)
            .ok_or(LoadError::ComponentSetup("createInstance failed"))?;

        let context = self
            .host
            .lock()
            .as_ref()
            .map(|h| h.as_ptr() as *mut FUnknown)
            .unwrap_or(ptr::null_mut());
        // SAFETY: component is live; context is null or the retained host.
        if unsafe { component.initialize(context) } != kResultOk {
            return Err(LoadError::ComponentSetup("initialize failed"));
        }

        let Some(processor) = component.cast::<IAudioProcessor>() else {
            // SAFETY: Initialized above.
            unsafe { component.terminate() };
            return Err(LoadError::ComponentSetup("no IAudioProcessor"));
        };

        let mut controller_cid: TUID = [0; 16];
        // SAFETY: controller_cid is a valid out-parameter.
        if unsafe { component.getControllerClassId(&mut controller_cid) } == kResultOk
            && controller_cid != [0; 16]
        {
            self.registry.set_controller_class_id(controller_cid);
        }
        self.registry.set_hosted_component(Some(component.clone()));

        // SAFETY: component is live and initialized.
        unsafe { activate_main_buses(&component) };

        let wrapper = self.wrapper.lock();
        let mut hosted = self.hosted.lock();
        hosted.component = Some(component.clone());
        hosted.processor = Some(processor.clone());
        hosted.module = Some(module);
        hosted.path = path.to_string();

        // SAFETY: Hosted objects are live; arrangement buffers outlive the calls.
        unsafe {
            if let Some((inputs, outputs)) = &wrapper.arrangements {
                let mut inputs = inputs.clone();
                let mut outputs = outputs.clone();
                processor.setBusArrangements(
                    inputs.as_mut_ptr(),
                    inputs.len() as int32,
                    outputs.as_mut_ptr(),
                    outputs.len() as int32,
                );
            }
            if let Some(setup) = wrapper.setup {
                let mut setup = setup.to_setup();
                processor.setupProcessing(&mut setup);
            }
            if wrapper.active {
                hosted.active = component.setActive(1) == kResultOk;
            }
            if wrapper.processing && hosted.active {
                hosted.processing = processor.setProcessing(1) == kResultOk;
            }
        }

        hosted.ready = true;
        info!("Hosted processor ready for {path}");
        Ok(())
    }

    /// Stop, deactivate and release the hosted processing object. Only
    /// transitions that were entered are undone. Idempotent.
    pub fn unload(&self) {
        let (component, processor, module) = {
            let mut hosted = self.hosted.lock();
            hosted.ready = false;
            // SAFETY: Hosted objects are live while stored.
            unsafe {
                if hosted.processing {
                    if let Some(processor) = &hosted.processor {
                        processor.setProcessing(0);
                    }
                    hosted.processing = false;
                }
                if hosted.active {
                    if let Some(component) = &hosted.component {
                        component.setActive(0);
                    }
                    hosted.active = false;
                }
            }
            hosted.path.clear();
            (hosted.component.take(), hosted.processor.take(), hosted.module.take())
        };

        if let Some(component) = component {
            if self
                .registry
                .hosted_component()
                .is_some_and(|c| c.as_ptr() == component.as_ptr())
            {
                self.registry.set_hosted_component(None);
            }
            drop(processor);
            // SAFETY: Initialized in load.
            unsafe { component.terminate() };
            debug!("Hosted processor released");
        }
        drop(module);
    }

    fn handle_load_message(&self, message: ComRef<'_, IMessage>) -> tresult {
        let Some(path) = read_path(message) else {
            warn!("LoadPlugin message without a path");
            return kResultFalse;
        };
        info!("Processor received LoadPlugin for {path}");

        let keep = {
            let hosted = self.hosted.lock();
            hosted.ready && hosted.path == path
        };
        if !keep {
            self.unload();
            if let Err(e) = self.load(&path) {
                error!("Processor failed to load {path}: {e}");
            }
        }
        self.send(MSG_PLUGIN_LOADED, Some(&path));
        kResultOk
    }

    fn send(&self, id: &std::ffi::CStr, path: Option<&str>) {
        let peer = self.peer.lock().clone();
        let host = self.host.lock().clone();
        let Some(peer) = peer else {
            return;
        };
        if let Some(message) = build_message(host.as_ref(), id, path) {
            // SAFETY: Retained peer and message.
            unsafe { peer.notify(message.as_ptr()) };
        }
    }
}

/// Enable the first audio input, audio output and event input bus of the
/// hosted component; disable any others.
unsafe fn activate_main_buses(component: &ComPtr<IComponent>) {
    let kinds = [
        (MediaTypes_::kAudio, BusDirections_::kInput),
        (MediaTypes_::kAudio, BusDirections_::kOutput),
        (MediaTypes_::kEvent, BusDirections_::kInput),
    ];
    for (media, dir) in kinds {
        // SAFETY: component is live per caller contract.
        unsafe {
            let count = component.getBusCount(media as MediaType, dir as BusDirection);
            for index in 0..count {
                let state = (index == 0) as TBool;
                component.activateBus(media as MediaType, dir as BusDirection, index, state);
            }
        }
    }
}

// =============================================================================
// Passthrough
// =============================================================================

/// Copy input channels to output channels for one block.
///
/// Aliased channels are left alone; outputs without a matching input
/// channel are zeroed.
///
/// # Safety
///
/// `data` must describe valid buffers for `numSamples` samples.
pub unsafe fn passthrough(data: &ProcessData) {
    let samples = data.numSamples.max(0) as usize;
    if samples == 0 || data.numOutputs <= 0 || data.outputs.is_null() {
        return;
    }
    // SAFETY: Bus arrays hold numOutputs/numInputs entries per the ABI.
    let outputs = unsafe { slice::from_raw_parts(data.outputs, data.numOutputs as usize) };
    let inputs = if data.numInputs <= 0 || data.inputs.is_null() {
        &[][..]
    } else {
        // SAFETY: See above.
        unsafe { slice::from_raw_parts(data.inputs, data.numInputs as usize) }
    };
    let wide = data.symbolicSampleSize == SymbolicSampleSizes_::kSample64 as int32;

    for (index, output) in outputs.iter().enumerate() {
        let input = inputs.get(index);
        // SAFETY: The active sample size selects the union field.
        unsafe {
            if wide {
                copy_bus(
                    input.map(|b| (b.__field0.channelBuffers64, b.numChannels)),
                    (output.__field0.channelBuffers64, output.numChannels),
                    samples,
                );
            } else {
                copy_bus(
                    input.map(|b| (b.__field0.channelBuffers32, b.numChannels)),
                    (output.__field0.channelBuffers32, output.numChannels),
                    samples,
                );
            }
        }
    }
}

unsafe fn copy_bus<T>(input: Option<(*mut *mut T, int32)>, output: (*mut *mut T, int32), samples: usize) {
    let (out_channels, out_count) = output;
    if out_channels.is_null() {
        return;
    }
    let (in_channels, in_count) = match input {
        Some((channels, count)) if !channels.is_null() => (channels, count.max(0) as usize),
        _ => (ptr::null_mut(), 0),
    };

    for ch in 0..out_count.max(0) as usize {
        // SAFETY: Channel arrays hold numChannels pointers.
        let dst = unsafe { *out_channels.add(ch) };
        if dst.is_null() {
            continue;
        }
        let src = if ch < in_count {
            // SAFETY: ch is below the input channel count.
            unsafe { *in_channels.add(ch) }
        } else {
            ptr::null_mut()
        };
        // SAFETY: Both channels hold at least `samples` values.
        unsafe {
            if src.is_null() {
                ptr::write_bytes(dst, 0, samples);
            } else if src != dst {
                ptr::copy(src, dst, samples);
            }
        }
    }
}

// =============================================================================
// COM
// =============================================================================

impl Class for WrapperProcessor {
    type Interfaces = (IComponent, IAudioProcessor, IProcessContextRequirements, IConnectionPoint);
}

impl IPluginBaseTrait for WrapperProcessor {
    unsafe fn initialize(&self, context: *mut FUnknown) -> tresult {
        // SAFETY: context is null or a live host object.
        let host = unsafe { retain(context) }.and_then(|c| c.cast::<IHostApplication>());
        *self.host.lock() = host;
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.unload();
        self.peer.lock().take();
        self.host.lock().take();
        kResultOk
    }
}

impl IComponentTrait for WrapperProcessor {
    unsafe fn getControllerClassId(&self, class_id_out: *mut TUID) -> tresult {
        if class_id_out.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        unsafe { *class_id_out = class_id(self.config.controller_id) };
        kResultOk
    }

    unsafe fn setIoMode(&self, _mode: IoMode) -> tresult {
        kResultOk
    }

    unsafe fn getBusCount(&self, media_type: MediaType, dir: BusDirection) -> int32 {
        match (media_type as MediaTypes, dir as BusDirections) {
            (MediaTypes_::kAudio, _) => 1,
            (MediaTypes_::kEvent, BusDirections_::kInput) => 1,
            _ => 0,
        }
    }

    unsafe fn getBusInfo(
        &self,
        media_type: MediaType,
        dir: BusDirection,
        index: int32,
        bus: *mut BusInfo,
    ) -> tresult {
        if bus.is_null() {
            return kInvalidArgument;
        }
        let (name, channels) = match (media_type as MediaTypes, dir as BusDirections, index) {
            (MediaTypes_::kAudio, BusDirections_::kInput, 0) => ("Stereo In", 2),
            (MediaTypes_::kAudio, BusDirections_::kOutput, 0) => ("Stereo Out", 2),
            (MediaTypes_::kEvent, BusDirections_::kInput, 0) => ("Event In", 1),
            _ => return kInvalidArgument,
        };
        // SAFETY: Checked non-null; host guarantees validity.
        let bus = unsafe { &mut *bus };
        bus.mediaType = media_type;
        bus.direction = dir;
        bus.channelCount = channels;
        copy_wstring(name, &mut bus.name);
        bus.busType = BusTypes_::kMain as BusType;
        bus.flags = BusInfo_::BusFlags_::kDefaultActive;
        kResultOk
    }

    unsafe fn getRoutingInfo(&self, _in_info: *mut RoutingInfo, _out_info: *mut RoutingInfo) -> tresult {
        kNotImplemented
    }

    unsafe fn activateBus(
        &self,
        _media_type: MediaType,
        _dir: BusDirection,
        _index: int32,
        _state: TBool,
    ) -> tresult {
        kResultOk
    }

    unsafe fn setActive(&self, state: TBool) -> tresult {
        let mut wrapper = self.wrapper.lock();
        wrapper.active = state != 0;
        let mut hosted = self.hosted.lock();
        if let Some(component) = hosted.component.clone() {
            // SAFETY: Hosted component is live while stored.
            let result = unsafe { component.setActive(state) };
            if result == kResultOk {
                hosted.active = state != 0;
            }
        }
        kResultOk
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        // SAFETY: state is null or a live host stream.
        let Some(stream) = (unsafe { ComRef::from_raw(state) }) else {
            return kInvalidArgument;
        };
        let path = match read_header(&mut StreamReader::new(stream)) {
            Ok(path) => path,
            Err(e) => {
                warn!("Rejecting processor state: {e}");
                return kResultFalse;
            }
        };

        if !path.is_empty() && path != self.loaded_path() {
            self.unload();
            if let Err(e) = self.load(&path) {
                error!("Processor state names {path}, which failed to load: {e}");
            }
        }

        let component = self.hosted.lock().component.clone();
        match component {
            // SAFETY: Stream is positioned after the header.
            Some(component) => unsafe { component.setState(state) },
            None => kResultOk,
        }
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        // SAFETY: state is null or a live host stream.
        let Some(stream) = (unsafe { ComRef::from_raw(state) }) else {
            return kInvalidArgument;
        };
        let (path, component) = {
            let hosted = self.hosted.lock();
            (hosted.path.clone(), hosted.component.clone())
        };
        if let Err(e) = write_header(&mut StreamWriter::new(stream), &path) {
            warn!("Failed to write processor state: {e}");
            return kResultFalse;
        }
        match component {
            // SAFETY: Hosted component is live while retained.
            Some(component) => unsafe { component.getState(state) },
            None => kResultOk,
        }
    }
}

impl IAudioProcessorTrait for WrapperProcessor {
    unsafe fn setBusArrangements(
        &self,
        inputs: *mut SpeakerArrangement,
        num_ins: int32,
        outputs: *mut SpeakerArrangement,
        num_outs: int32,
    ) -> tresult {
        if num_ins < 0 || num_outs < 0 {
            return kInvalidArgument;
        }
        if (num_ins > 0 && inputs.is_null()) || (num_outs > 0 && outputs.is_null()) {
            return kInvalidArgument;
        }
        // SAFETY: Non-null arrays of the given lengths per the ABI.
        let (ins, outs) = unsafe {
            (
                if num_ins > 0 { slice::from_raw_parts(inputs, num_ins as usize).to_vec() } else { Vec::new() },
                if num_outs > 0 { slice::from_raw_parts(outputs, num_outs as usize).to_vec() } else { Vec::new() },
            )
        };

        let mut wrapper = self.wrapper.lock();
        wrapper.arrangements = Some((ins.clone(), outs.clone()));
        let processor = self.hosted.lock().processor.clone();
        let hosted_result = processor.map(|processor| {
            let (mut ins, mut outs) = (ins, outs);
            // SAFETY: Local copies outlive the call.
            unsafe {
                processor.setBusArrangements(ins.as_mut_ptr(), num_ins, outs.as_mut_ptr(), num_outs)
            }
        });

        if num_ins == 1 && num_outs == 1 {
            kResultTrue
        } else {
            hosted_result.unwrap_or(kResultFalse)
        }
    }

    unsafe fn getBusArrangement(
        &self,
        dir: BusDirection,
        index: int32,
        arr: *mut SpeakerArrangement,
    ) -> tresult {
        if arr.is_null() {
            return kInvalidArgument;
        }
        match (dir as BusDirections, index) {
            (BusDirections_::kInput | BusDirections_::kOutput, 0) => {
                // SAFETY: Checked non-null.
                unsafe { *arr = SpeakerArr::kStereo };
                kResultOk
            }
            _ => kInvalidArgument,
        }
    }

    unsafe fn canProcessSampleSize(&self, symbolic_sample_size: int32) -> tresult {
        let processor = self.hosted.lock().processor.clone();
        match processor {
            // SAFETY: Hosted processor is live while retained.
            Some(processor) => unsafe { processor.canProcessSampleSize(symbolic_sample_size) },
            None if symbolic_sample_size == SymbolicSampleSizes_::kSample32 as int32 => kResultTrue,
            None => kResultFalse,
        }
    }

    unsafe fn getLatencySamples(&self) -> uint32 {
        let processor = self.hosted.lock().processor.clone();
        // SAFETY: Hosted processor is live while retained.
        processor.map(|p| unsafe { p.getLatencySamples() }).unwrap_or(0)
    }

    unsafe fn setupProcessing(&self, setup: *mut ProcessSetup) -> tresult {
        // SAFETY: setup is null or valid per the ABI.
        let Some(value) = (unsafe { setup.as_ref() }) else {
            return kInvalidArgument;
        };
        let snapshot = SetupSnapshot {
            process_mode: value.processMode,
            symbolic_sample_size: value.symbolicSampleSize,
            max_samples_per_block: value.maxSamplesPerBlock,
            sample_rate: value.sampleRate,
        };

        let mut wrapper = self.wrapper.lock();
        wrapper.setup = Some(snapshot);
        let processor = self.hosted.lock().processor.clone();
        match processor {
            // SAFETY: Hosted processor is live while retained.
            Some(processor) => unsafe { processor.setupProcessing(setup) },
            None => kResultOk,
        }
    }

    unsafe fn setProcessing(&self, state: TBool) -> tresult {
        let mut wrapper = self.wrapper.lock();
        wrapper.processing = state != 0;
        let mut hosted = self.hosted.lock();
        if let Some(processor) = hosted.processor.clone() {
            if state == 0 || hosted.active {
                // SAFETY: Hosted processor is live while stored.
                let result = unsafe { processor.setProcessing(state) };
                if result == kResultOk {
                    hosted.processing = state != 0;
                }
            }
        }
        kResultOk
    }

    unsafe fn process(&self, data: *mut ProcessData) -> tresult {
        if data.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: data is non-null and valid for this call.
        let data = unsafe { &mut *data };

        let Some(mut guard) = self.hosted.try_lock() else {
            // SAFETY: Host buffers are valid for numSamples.
            unsafe { passthrough(data) };
            return kResultOk;
        };
        let hosted = &mut *guard;
        let processor = match &hosted.processor {
            Some(processor) if hosted.ready && hosted.active => processor,
            _ => {
                // SAFETY: Host buffers are valid for numSamples.
                unsafe { passthrough(data) };
                return kResultOk;
            }
        };

        self.registry.drain_param_changes(&mut hosted.scratch);
        if hosted.scratch.is_empty() {
            // SAFETY: Hosted processor is live while stored.
            return unsafe { processor.process(data) };
        }

        let original = data.inputParameterChanges;
        // SAFETY: The host change set is live for this call and the merged
        // set is idle between process calls.
        unsafe { hosted.merged.merge(original, &hosted.scratch) };
        if let Some(merged) = hosted.merged.as_com_ref::<IParameterChanges>() {
            data.inputParameterChanges = merged.as_ptr();
        }
        // SAFETY: Hosted processor is live while stored.
        let result = unsafe { processor.process(data) };
        data.inputParameterChanges = original;
        result
    }

    unsafe fn getTailSamples(&self) -> uint32 {
        let processor = self.hosted.lock().processor.clone();
        // SAFETY: Hosted processor is live while retained.
        processor.map(|p| unsafe { p.getTailSamples() }).unwrap_or(0)
    }
}

impl IProcessContextRequirementsTrait for WrapperProcessor {
    unsafe fn getProcessContextRequirements(&self) -> uint32 {
        // The hosted plugin may be swapped after the host asks, so request
        // everything.
        const K_NEED_SYSTEM_TIME: u32 = 1 << 0;
        const K_NEED_CONTINUOUS_TIME_SAMPLES: u32 = 1 << 1;
        const K_NEED_PROJECT_TIME_MUSIC: u32 = 1 << 2;
        const K_NEED_BAR_POSITION_MUSIC: u32 = 1 << 3;
        const K_NEED_CYCLE_MUSIC: u32 = 1 << 4;
        const K_NEED_SAMPLES_TO_NEXT_CLOCK: u32 = 1 << 5;
        const K_NEED_TEMPO: u32 = 1 << 6;
        const K_NEED_TIME_SIGNATURE: u32 = 1 << 7;
        const K_NEED_CHORD: u32 = 1 << 8;
        const K_NEED_FRAME_RATE: u32 = 1 << 9;
        const K_NEED_TRANSPORT_STATE: u32 = 1 << 10;

        K_NEED_SYSTEM_TIME
            | K_NEED_CONTINUOUS_TIME_SAMPLES
            | K_NEED_PROJECT_TIME_MUSIC
            | K_NEED_BAR_POSITION_MUSIC
            | K_NEED_CYCLE_MUSIC
            | K_NEED_SAMPLES_TO_NEXT_CLOCK
            | K_NEED_TEMPO
            | K_NEED_TIME_SIGNATURE
            | K_NEED_CHORD
            | K_NEED_FRAME_RATE
            | K_NEED_TRANSPORT_STATE
    }
}

impl IConnectionPointTrait for WrapperProcessor {
    unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
        // SAFETY: other is null or a live connection point.
        let Some(other) = (unsafe { retain(other) }) else {
            return kInvalidArgument;
        };
        *self.peer.lock() = Some(other);
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        self.peer.lock().take();
        kResultOk
    }

    unsafe fn notify(&self, message: *mut IMessage) -> tresult {
        // SAFETY: message is null or live for the call.
        let Some(message) = (unsafe { ComRef::from_raw(message) }) else {
            return kInvalidArgument;
        };
        if is_message(message, MSG_LOAD_PLUGIN) {
            self.handle_load_message(message)
        } else if is_message(message, MSG_UNLOAD_PLUGIN) {
            info!("Processor received UnloadPlugin");
            self.unload();
            kResultOk
        } else {
            kResultFalse
        }
    }
}
