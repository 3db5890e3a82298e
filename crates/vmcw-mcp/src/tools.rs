//! Tool surface and handlers.
//!
//! Handlers are written against [`PluginControl`], which the wrapper's
//! control identity implements. Argument validation (missing arguments,
//! non-finite values, clamping) happens here so every implementation sees
//! clean input.

use serde_json::{json, Value};

use vmcw_core::{clamp_normalized, ParameterSnapshot, ParameterValue};

use crate::error::{ControlError, Result};
use crate::protocol::ToolResult;

/// Operations the control channel can perform on the hosted plugin.
///
/// Implementations are called from the server's blocking pool and must be
/// thread-safe. `load_plugin` and `unload_plugin` may block for a bounded
/// time while lifecycle work runs elsewhere.
pub trait PluginControl: Send + Sync + 'static {
    /// Every parameter of the hosted controller.
    fn list_parameters(&self) -> Result<Vec<ParameterSnapshot>>;

    /// Current value of one parameter.
    fn get_parameter(&self, id: u32) -> Result<ParameterValue>;

    /// Apply an already clamped normalized value and read it back.
    fn set_parameter(&self, id: u32, value: f64) -> Result<ParameterValue>;

    /// Path of the loaded plugin, or `None`.
    fn loaded_plugin(&self) -> Option<String>;

    /// Load the plugin at `path`, replacing any loaded one.
    fn load_plugin(&self, path: &str) -> Result<()>;

    /// Unload the current plugin.
    fn unload_plugin(&self) -> Result<()>;

    /// Installed plugin bundles.
    fn available_plugins(&self) -> Vec<String> {
        vmcw_core::scan::available_plugins()
    }
}

// =========================================================================
// Descriptors
// =========================================================================

pub const LIST_PARAMETERS: &str = "list_parameters";
pub const GET_PARAMETER: &str = "get_parameter";
pub const SET_PARAMETER: &str = "set_parameter";
pub const LIST_AVAILABLE_PLUGINS: &str = "list_available_plugins";
pub const LOAD_PLUGIN: &str = "load_plugin";
pub const UNLOAD_PLUGIN: &str = "unload_plugin";
pub const GET_LOADED_PLUGIN: &str = "get_loaded_plugin";

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Tool list returned by `tools/list`.
pub fn tool_descriptors() -> Value {
    json!([
        {
            "name": LIST_PARAMETERS,
            "description": "List all parameters of the hosted VST3 plugin with their IDs, names, and current values",
            "inputSchema": no_arguments(),
        },
        {
            "name": GET_PARAMETER,
            "description": "Get the current value of a specific parameter by its ID",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "number", "description": "Parameter ID" }
                },
                "required": ["id"],
            },
        },
        {
            "name": SET_PARAMETER,
            "description": "Set the normalized value (0.0 to 1.0) of a specific parameter by its ID",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": { "type": "number", "description": "Parameter ID" },
                    "value": { "type": "number", "description": "Normalized value (0.0 to 1.0)" }
                },
                "required": ["id", "value"],
            },
        },
        {
            "name": LIST_AVAILABLE_PLUGINS,
            "description": "List all VST3 plugins installed on the system",
            "inputSchema": no_arguments(),
        },
        {
            "name": LOAD_PLUGIN,
            "description": "Load a VST3 plugin by its file path. Use list_available_plugins to see available plugins.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to the .vst3 bundle" }
                },
                "required": ["path"],
            },
        },
        {
            "name": UNLOAD_PLUGIN,
            "description": "Unload the currently hosted VST3 plugin and return to the drop zone",
            "inputSchema": no_arguments(),
        },
        {
            "name": GET_LOADED_PLUGIN,
            "description": "Get the currently loaded VST3 plugin path",
            "inputSchema": no_arguments(),
        },
    ])
}

// =========================================================================
// Argument extraction
// =========================================================================

/// Parameter ids are `u32`; numbers outside that range are rejected rather
/// than truncated.
fn arg_id(args: &Value) -> Result<u32> {
    let value = args.get("id").ok_or(ControlError::MissingArgument("id"))?;
    if let Some(id) = value.as_u64() {
        return u32::try_from(id).map_err(|_| ControlError::InvalidArgument("id"));
    }
    match value.as_f64() {
        Some(id) if id.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&id) => Ok(id as u32),
        Some(_) => Err(ControlError::InvalidArgument("id")),
        None => Err(ControlError::MissingArgument("id")),
    }
}

/// Numbers, or strings that parse as one ("NaN" and "inf" included, so
/// clients that cannot encode non-finite JSON numbers still hit the check).
fn arg_value(args: &Value) -> Result<f64> {
    match args.get("value") {
        Some(Value::Number(n)) => n.as_f64().ok_or(ControlError::MissingArgument("value")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ControlError::MissingArgument("value")),
        _ => Err(ControlError::MissingArgument("value")),
    }
}

fn arg_path(args: &Value) -> Result<&str> {
    args.get("path")
        .and_then(Value::as_str)
        .ok_or(ControlError::MissingArgument("path"))
}

fn respond<T: serde::Serialize>(result: Result<T>) -> ToolResult {
    match result {
        Ok(data) => ToolResult::json(&data),
        Err(e) => ToolResult::error(e.to_string()),
    }
}

// =========================================================================
// Handlers
// =========================================================================

/// `set_parameter` after argument extraction.
pub fn set_parameter(control: &dyn PluginControl, id: u32, value: f64) -> ToolResult {
    match clamp_normalized(value) {
        Some(clamped) => respond(control.set_parameter(id, clamped)),
        None => ToolResult::error(ControlError::NonFiniteValue.to_string()),
    }
}

/// Run tool `name` with `args`. Returns `None` for an unknown tool.
pub fn call_tool(control: &dyn PluginControl, name: &str, args: &Value) -> Option<ToolResult> {
    let result = match name {
        LIST_PARAMETERS => respond(control.list_parameters()),
        GET_PARAMETER => respond(arg_id(args).and_then(|id| control.get_parameter(id))),
        SET_PARAMETER => match arg_id(args).and_then(|id| Ok((id, arg_value(args)?))) {
            Ok((id, value)) => set_parameter(control, id, value),
            Err(e) => ToolResult::error(e.to_string()),
        },
        LIST_AVAILABLE_PLUGINS => ToolResult::json(&control.available_plugins()),
        LOAD_PLUGIN => match arg_path(args) {
            Ok(path) => match control.load_plugin(path) {
                Ok(()) => ToolResult::json(&json!({ "status": "loaded", "path": path })),
                Err(e) => ToolResult::error(e.to_string()),
            },
            Err(e) => ToolResult::error(e.to_string()),
        },
        UNLOAD_PLUGIN => match control.unload_plugin() {
            Ok(()) => ToolResult::text("Plugin unloaded"),
            Err(e) => ToolResult::error(e.to_string()),
        },
        GET_LOADED_PLUGIN => {
            let body = match control.loaded_plugin() {
                Some(path) => json!({ "loaded": true, "path": path }),
                None => json!({ "loaded": false, "path": "none" }),
            };
            ToolResult::json(&body)
        }
        _ => return None,
    };
    Some(result)
}

// =========================================================================
// Tests
// =========================================================================
