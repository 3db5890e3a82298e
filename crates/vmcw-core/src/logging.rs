//! Optional logger installation.
//!
//! Library code only talks to the `log` facade. The plugin entry point calls
//! [`init`] once so messages go somewhere when the host does not install a
//! logger of its own.

use env_logger::{Builder, Env};
use log::info;

/// Environment variable holding the log filter. Falls back to `RUST_LOG`.
pub const ENV_LOG: &str = "VMCW_LOG";

/// Install an `env_logger` backend. Safe to call any number of times.
///
/// Returns `false` when a logger was already installed.
pub fn init() -> bool {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    Builder::from_env(Env::default())
        .parse_filters(&filter)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
