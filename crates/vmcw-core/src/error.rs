//! Error types for the format-agnostic core.

/// Errors produced by the persisted-state codec.
#[derive(Debug)]
pub enum StateError {
    /// The stream does not start with the wrapper magic.
    BadMagic([u8; 4]),
    /// The header carries a version this build cannot read.
    UnsupportedVersion(u32),
    /// The declared path length exceeds the allowed maximum.
    PathTooLong(u32),
    /// A read returned fewer bytes than the field needs.
    Truncated {
        /// Bytes the field needs.
        expected: usize,
        /// Bytes the stream delivered.
        actual: usize,
    },
    /// A write accepted fewer bytes than offered.
    ShortWrite {
        /// Bytes offered.
        expected: usize,
        /// Bytes accepted.
        actual: usize,
    },
    /// The embedded path is not valid UTF-8.
    InvalidUtf8,
    /// The underlying stream failed.
    Io(std::io::Error),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic(found) => write!(f, "bad state magic: {found:02x?}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported state version {v}"),
            Self::PathTooLong(len) => write!(f, "plugin path length {len} exceeds limit"),
            Self::Truncated { expected, actual } => {
                write!(f, "truncated state: needed {expected} bytes, got {actual}")
            }
            Self::ShortWrite { expected, actual } => {
                write!(f, "short write: offered {expected} bytes, wrote {actual}")
            }
            Self::InvalidUtf8 => write!(f, "plugin path is not valid UTF-8"),
            Self::Io(e) => write!(f, "state stream error: {e}"),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors observed by a caller waiting on dispatched work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher was shut down before the work ran.
    ShutDown,
    /// The bounded wait elapsed; the work may still run later.
    TimedOut,
    /// The worker went away without producing a value.
    Disconnected,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShutDown => write!(f, "dispatcher is shut down"),
            Self::TimedOut => write!(f, "timed out waiting for dispatched work"),
            Self::Disconnected => write!(f, "dispatch worker disconnected"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Result type for state codec operations.
pub type Result<T> = std::result::Result<T, StateError>;
