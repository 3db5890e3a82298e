//! MCP tool backend over the controller state.
//!
//! Parameter reads and writes go straight to the hosted edit controller.
//! Load and unload are queued on the controller's [`Dispatcher`] and waited
//! on for at most [`DISPATCH_TIMEOUT`].
//!
//! [`Dispatcher`]: vmcw_core::Dispatcher

use std::mem;
use std::sync::Arc;

use log::warn;
use vmcw_core::config::DISPATCH_TIMEOUT;
use vmcw_core::{DispatchError, ParameterSnapshot, ParameterValue};
use vmcw_mcp::{ControlError, Operation, PluginControl};
use vst3::ComPtr;
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;

use crate::controller::ControllerState;
use crate::util::wstring_to_string;

/// [`PluginControl`] over the controller state.
pub struct ChannelControl {
    state: Arc<ControllerState>,
}

impl ChannelControl {
    pub fn new(state: Arc<ControllerState>) -> Self {
        Self { state }
    }

    fn controller(&self) -> vmcw_mcp::Result<ComPtr<IEditController>> {
        self.state.hosted_controller().ok_or(ControlError::NoHostedPlugin)
    }

    /// Run `work` on the dispatch thread and wait for it.
    fn run_lifecycle<F>(&self, operation: Operation, work: F) -> vmcw_mcp::Result<()>
    where
        F: FnOnce(&ControllerState) -> Result<(), String> + Send + 'static,
    {
        if !self.state.dispatcher().is_alive() {
            return Err(ControlError::ShuttingDown);
        }
        let state = Arc::downgrade(&self.state);
        let pending = self
            .state
            .dispatcher()
            .dispatch(move || state.upgrade().map(|state| work(&state)), None);

        match pending.wait_timeout(DISPATCH_TIMEOUT) {
            Ok(Some(Ok(()))) => Ok(()),
            Ok(Some(Err(reason))) => Err(ControlError::LoadFailed(reason)),
            Ok(None) | Err(DispatchError::ShutDown) | Err(DispatchError::Disconnected) => {
                Err(ControlError::ShuttingDown)
            }
            Err(DispatchError::TimedOut) => {
                warn!("{operation:?} did not finish within {DISPATCH_TIMEOUT:?}");
                Err(ControlError::TimedOut(operation))
            }
        }
    }
}

fn find_parameter(controller: &ComPtr<IEditController>, id: ParamID) -> Option<ParameterInfo> {
    // SAFETY: Retained controller; info is plain data.
    unsafe {
        let count = controller.getParameterCount();
        let mut info: ParameterInfo = mem::zeroed();
        (0..count).find_map(|index| {
            (controller.getParameterInfo(index, &mut info) == kResultOk && info.id == id).then_some(info)
        })
    }
}

fn display_value(controller: &ComPtr<IEditController>, id: ParamID, value: ParamValue) -> String {
    let mut text: String128 = [0; 128];
    // SAFETY: text is a valid String128.
    if unsafe { controller.getParamStringByValue(id, value, &mut text) } == kResultOk {
        wstring_to_string(&text)
    } else {
        String::new()
    }
}

fn parameter_value(controller: &ComPtr<IEditController>, id: ParamID) -> ParameterValue {
    // SAFETY: Retained controller.
    let value = unsafe { controller.getParamNormalized(id) };
    ParameterValue {
        id,
        normalized_value: value,
        display_value: display_value(controller, id, value),
    }
}

impl PluginControl for ChannelControl {
    fn list_parameters(&self) -> vmcw_mcp::Result<Vec<ParameterSnapshot>> {
        let controller = self.controller()?;
        let mut parameters = Vec::new();
        // SAFETY: Retained controller; info is plain data.
        unsafe {
            let mut info: ParameterInfo = mem::zeroed();
            for index in 0..controller.getParameterCount() {
                if controller.getParameterInfo(index, &mut info) != kResultOk {
                    continue;
                }
                let value = parameter_value(&controller, info.id);
                parameters.push(ParameterSnapshot {
                    id: info.id,
                    title: wstring_to_string(&info.title),
                    units: wstring_to_string(&info.units),
                    normalized_value: value.normalized_value,
                    display_value: value.display_value,
                    default_normalized_value: info.defaultNormalizedValue,
                    step_count: info.stepCount,
                    can_automate: info.flags & ParameterInfo_::ParameterFlags_::kCanAutomate != 0,
                });
            }
        }
        Ok(parameters)
    }

    fn get_parameter(&self, id: u32) -> vmcw_mcp::Result<ParameterValue> {
        let controller = self.controller()?;
        find_parameter(&controller, id).ok_or(ControlError::UnknownParameter(id))?;
        Ok(parameter_value(&controller, id))
    }

    fn set_parameter(&self, id: u32, value: f64) -> vmcw_mcp::Result<ParameterValue> {
        let controller = self.controller()?;
        find_parameter(&controller, id).ok_or(ControlError::UnknownParameter(id))?;
        let value = vmcw_core::clamp_normalized(value).ok_or(ControlError::NonFiniteValue)?;
        // SAFETY: Retained controller.
        unsafe { controller.setParamNormalized(id, value) };
        self.state.registry().push_param_change(id, value);
        Ok(parameter_value(&controller, id))
    }

    fn loaded_plugin(&self) -> Option<String> {
        let path = self.state.loaded_path();
        (!path.is_empty()).then_some(path)
    }

    fn load_plugin(&self, path: &str) -> vmcw_mcp::Result<()> {
        let path = path.to_string();
        self.run_lifecycle(Operation::Load, move |state| {
            state.load_plugin(&path).map_err(|e| e.to_string())
        })
    }

    fn unload_plugin(&self) -> vmcw_mcp::Result<()> {
        if self.loaded_plugin().is_none() {
            return Err(ControlError::NotLoaded);
        }
        self.run_lifecycle(Operation::Unload, |state| {
            state.unload_plugin();
            Ok(())
        })
    }
}
