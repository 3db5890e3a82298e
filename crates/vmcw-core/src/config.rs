//! Wrapper configuration.
//!
//! Compile-time constants shared by the processing and control identities,
//! plus [`WrapperConfig`], the `const`-constructible description of the
//! wrapper plugin itself (name, vendor, class identifiers, control endpoint).
//!
//! # Example
//!
//! ```ignore
//! use vmcw_core::WrapperConfig;
//!
//! pub static CONFIG: WrapperConfig = WrapperConfig::new("VST3 MCP Wrapper")
//!     .with_vendor("VMCW")
//!     .with_processor_id("A3E7B2C1-4F8D-6E5A-91C3-D7F20B6A8E4D")
//!     .with_controller_id("D5F1A9E3-72B4-C806-E8A2-F5631D9C47B0");
//! ```

use std::time::Duration;

// =========================================================================
// Persisted state
// =========================================================================

/// Magic bytes at the start of every persisted wrapper state.
pub const STATE_MAGIC: [u8; 4] = *b"VMCW";

/// The single supported persisted-state version.
pub const STATE_VERSION: u32 = 1;

/// Upper bound on the embedded plugin path, in bytes.
pub const MAX_PATH_LEN: u32 = 4096;

// =========================================================================
// Parameter queue
// =========================================================================

/// Bound on out-of-band parameter changes waiting for the audio thread.
pub const MAX_PENDING_PARAM_CHANGES: usize = 10_000;

// =========================================================================
// Control channel
// =========================================================================

/// Loopback address the control channel binds to.
pub const CONTROL_HOST: &str = "127.0.0.1";

/// Fixed control-channel port.
pub const CONTROL_PORT: u16 = 8771;

/// Server name reported during the control-channel handshake.
pub const SERVER_NAME: &str = "VST3 MCP Wrapper";

/// Server version reported during the control-channel handshake.
pub const SERVER_VERSION: &str = "0.1.0";

/// How long a control-channel caller waits for main-thread work.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable overriding [`CONTROL_PORT`].
pub const ENV_CONTROL_PORT: &str = "VMCW_MCP_PORT";

/// Environment variable that disables the control channel when set to `1`.
pub const ENV_CONTROL_DISABLE: &str = "VMCW_MCP_DISABLE";

/// Environment variable listing extra plugin scan directories.
pub const ENV_SCAN_PATH: &str = "VST3_PATH";

// =========================================================================
// View
// =========================================================================

/// Placeholder view width in pixels.
pub const DEFAULT_VIEW_WIDTH: i32 = 400;

/// Placeholder view height in pixels.
pub const DEFAULT_VIEW_HEIGHT: i32 = 300;

// =========================================================================
// UUID string parsing (compile-time)
// =========================================================================

const fn hex_to_u8(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => panic!("Invalid hex character in class id"),
    }
}

/// Read 8 hex digits starting at `start`, skipping dashes.
const fn parse_id_word(bytes: &[u8], start: usize) -> u32 {
    let mut result: u32 = 0;
    let mut i = 0;
    let mut digits = 0;
    while digits < 8 {
        let c = bytes[start + i];
        if c != b'-' {
            result = (result << 4) | (hex_to_u8(c) as u32);
            digits += 1;
        }
        i += 1;
    }
    result
}

/// Parse "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX" into the four words the
/// VST3 `uid()` helper takes.
pub const fn parse_class_id(uuid: &str) -> [u32; 4] {
    let bytes = uuid.as_bytes();
    assert!(
        bytes.len() == 36,
        "class id must be a UUID in format XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
    );
    [
        parse_id_word(bytes, 0),
        parse_id_word(bytes, 9),
        parse_id_word(bytes, 19),
        parse_id_word(bytes, 28),
    ]
}

// =========================================================================
// WrapperConfig
// =========================================================================

/// Static description of the wrapper plugin.
///
/// One `static` instance is declared by the plugin crate and handed to the
/// export macro; both wrapper identities read it.
#[derive(Debug, Clone)]
pub struct WrapperConfig {
    /// Plugin name shown by the DAW. The controller class appends "Controller".
    pub name: &'static str,

    /// Vendor/company name.
    pub vendor: &'static str,

    /// Vendor URL.
    pub url: &'static str,

    /// Vendor email.
    pub email: &'static str,

    /// Plugin version string.
    pub version: &'static str,

    /// Audio-effect (processing identity) class id words.
    pub processor_id: [u32; 4],

    /// Edit-controller (control identity) class id words.
    pub controller_id: [u32; 4],

    /// Control-channel bind host.
    pub control_host: &'static str,

    /// Control-channel port, before environment overrides.
    pub control_port: u16,
}

impl WrapperConfig {
    /// Create a configuration with the fixed wrapper class ids.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            vendor: "Unknown Vendor",
            url: "",
            email: "",
            version: SERVER_VERSION,
            processor_id: [0xA3E7B2C1, 0x4F8D6E5A, 0x91C3D7F2, 0x0B6A8E4D],
            controller_id: [0xD5F1A9E3, 0x72B4C806, 0xE8A2F563, 0x1D9C47B0],
            control_host: CONTROL_HOST,
            control_port: CONTROL_PORT,
        }
    }

    /// Set the vendor name.
    pub const fn with_vendor(mut self, vendor: &'static str) -> Self {
        self.vendor = vendor;
        self
    }

    /// Set the vendor URL.
    pub const fn with_url(mut self, url: &'static str) -> Self {
        self.url = url;
        self
    }

    /// Set the vendor email.
    pub const fn with_email(mut self, email: &'static str) -> Self {
        self.email = email;
        self
    }

    /// Set the version string.
    pub const fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Override the processing identity class id from a UUID string.
    pub const fn with_processor_id(mut self, uuid: &'static str) -> Self {
        self.processor_id = parse_class_id(uuid);
        self
    }

    /// Override the control identity class id from a UUID string.
    pub const fn with_controller_id(mut self, uuid: &'static str) -> Self {
        self.controller_id = parse_class_id(uuid);
        self
    }

    /// Override the control-channel port.
    pub const fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    /// Control-channel port after applying `VMCW_MCP_PORT`.
    pub fn effective_control_port(&self) -> u16 {
        std::env::var(ENV_CONTROL_PORT)
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(self.control_port)
    }

    /// False when `VMCW_MCP_DISABLE=1` is set.
    pub fn control_enabled(&self) -> bool {
        !matches!(std::env::var(ENV_CONTROL_DISABLE).as_deref(), Ok("1"))
    }

    /// Name of the controller class.
    pub fn controller_name(&self) -> String {
        format!("{}Controller", self.name)
    }
}

// =========================================================================
// Tests
// =========================================================================
