//! # vmcw-core
//!
//! Format-agnostic building blocks of the VST3 MCP wrapper. Nothing here
//! depends on the VST3 ABI:
//!
//! - [`state`]: the persisted-state header prefixed to the hosted plugin's blob
//! - [`param_queue`]: bounded queue feeding out-of-band parameter changes to
//!   the audio thread
//! - [`dispatch`]: FIFO dispatcher with a liveness flag for lifecycle work
//! - [`scan`]: installed-plugin discovery
//! - [`config`]: constants and the static [`WrapperConfig`]
//!
//! ```text
//! control channel (vmcw-mcp)
//!        ↓ PluginControl
//! wrapper identities (vmcw-vst3) ── uses ──> vmcw-core
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod param_queue;
pub mod parameter;
pub mod scan;
pub mod state;

pub use config::WrapperConfig;
pub use dispatch::{Dispatcher, Pending};
pub use error::{DispatchError, Result, StateError};
pub use param_queue::{ParamChange, ParamQueue};
pub use parameter::{clamp_normalized, ParameterSnapshot, ParameterValue};
