//! # vmcw-mcp
//!
//! Local tool-call control channel for the VST3 MCP wrapper.
//!
//! A remote client speaks JSON-RPC 2.0 (the MCP dialect) over HTTP on the
//! loopback interface. The server knows nothing about VST3: every tool is
//! routed through the [`PluginControl`] trait, which the wrapper's control
//! identity implements.
//!
//! ```text
//! client ──POST /mcp──> McpServer ──spawn_blocking──> call_tool ──> PluginControl
//! ```

pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{ControlError, Operation, Result, ServerError};
pub use protocol::ToolResult;
pub use server::{handle_message, McpServer};
pub use tools::{call_tool, tool_descriptors, PluginControl};
