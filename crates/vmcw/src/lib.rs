//! # VST3 MCP Wrapper
//!
//! A VST3 plugin that loads another VST3 plugin at runtime and lets an MCP
//! client read and change the hosted plugin's parameters.
//!
//! The host sees one audio effect. Audio, state, buses and the editor are
//! forwarded to whichever plugin is loaded; with nothing loaded, audio is
//! passed through unchanged.
//!
//! The control channel listens on `http://127.0.0.1:8771/mcp` by default.
//! Set `VMCW_MCP_PORT` to move it or `VMCW_MCP_DISABLE=1` to turn it off.

use vmcw_vst3::{export_vst3, WrapperConfig};

/// Identity of the wrapper as seen by the host.
pub static CONFIG: WrapperConfig = WrapperConfig::new("VST3 MCP Wrapper")
    .with_vendor("VMCW")
    .with_version(env!("CARGO_PKG_VERSION"));

export_vst3!(CONFIG);
