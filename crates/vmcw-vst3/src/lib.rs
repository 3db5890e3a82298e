//! # vmcw-vst3
//!
//! VST3 layer of the MCP wrapper plugin.
//!
//! The wrapper is exported as two classes, an audio processor and an edit
//! controller, that host one dynamically loaded VST3 plugin between them:
//!
//! ```text
//!        host                       control channel (MCP over HTTP)
//!     ┌───┴────────────┐                     │
//!     ▼                ▼                     ▼
//! WrapperProcessor  WrapperController ◄── ChannelControl
//!     │   ▲  LoadPlugin / PluginLoaded │
//!     │   └────────────────────────────┘
//!     ▼                                ▼
//! hosted IComponent              hosted IEditController
//!     └────────── HostedModuleRegistry ┘
//! ```
//!
//! Both halves share the [`HostedModuleRegistry`]: the loaded module, the
//! resolved class ids and the queue of parameter edits waiting for the
//! audio thread.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vmcw_vst3::{export_vst3, WrapperConfig};
//!
//! static CONFIG: WrapperConfig = WrapperConfig::new("VST3 MCP Wrapper");
//!
//! export_vst3!(CONFIG);
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

#[cfg(feature = "control-channel")]
pub mod channel;
pub mod connection;
pub mod controller;
pub mod error;
pub mod export;
pub mod factory;
pub mod message;
pub mod module;
pub mod param_changes;
pub mod processor;
pub mod registry;
pub mod stream;
pub mod util;
pub mod view;

#[cfg(test)]
mod mock;

#[cfg(feature = "control-channel")]
pub use channel::ChannelControl;
pub use controller::WrapperController;
pub use error::{LoadError, ModuleError};
pub use factory::Factory;
pub use processor::WrapperProcessor;
pub use registry::HostedModuleRegistry;

pub use vmcw_core::WrapperConfig;

// Re-exported for the export macro.
pub use vmcw_core;
pub use vst3;
