//! Error types for the control channel.

/// Which long-running operation a timeout refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Unload,
}

/// Failure of a tool call. The `Display` text is what the remote caller sees.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// No hosted controller exists.
    NoHostedPlugin,
    /// The hosted controller does not know this parameter id.
    UnknownParameter(u32),
    /// A parameter value was NaN or infinite.
    NonFiniteValue,
    /// A required tool argument was absent or had the wrong type.
    MissingArgument(&'static str),
    /// A tool argument had the right type but an unusable value.
    InvalidArgument(&'static str),
    /// Loading failed; carries the reason.
    LoadFailed(String),
    /// `unload_plugin` was called with nothing loaded.
    NotLoaded,
    /// The wrapper is shutting down and no longer accepts lifecycle work.
    ShuttingDown,
    /// The main-thread work did not finish within the bounded wait.
    TimedOut(Operation),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHostedPlugin => write!(f, "No hosted plugin loaded"),
            Self::UnknownParameter(id) => write!(f, "Parameter ID {id} not found"),
            Self::NonFiniteValue => write!(f, "Parameter value must be a finite number"),
            Self::MissingArgument(name) => write!(f, "Missing required argument: {name}"),
            Self::InvalidArgument(name) => write!(f, "Invalid value for argument: {name}"),
            Self::LoadFailed(reason) => write!(f, "Failed to load plugin: {reason}"),
            Self::NotLoaded => write!(f, "No plugin is currently loaded"),
            Self::ShuttingDown => write!(f, "Plugin is shutting down"),
            Self::TimedOut(Operation::Load) => write!(f, "Load plugin timed out"),
            Self::TimedOut(Operation::Unload) => write!(f, "Unload plugin timed out"),
        }
    }
}

impl std::error::Error for ControlError {}

/// Failure to start the HTTP listener.
#[derive(Debug)]
pub enum ServerError {
    /// The address string did not parse.
    InvalidAddress(String),
    /// Runtime construction or socket bind failed.
    Io(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress(addr) => write!(f, "invalid listen address: {addr}"),
            Self::Io(e) => write!(f, "control channel I/O error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidAddress(_) => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Result type for tool calls.
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_texts() {
        assert_eq!(ControlError::NoHostedPlugin.to_string(), "No hosted plugin loaded");
        assert_eq!(
            ControlError::UnknownParameter(42).to_string(),
            "Parameter ID 42 not found"
        );
        assert!(ControlError::NonFiniteValue.to_string().contains("finite"));
        assert_eq!(
            ControlError::LoadFailed("No audio effect class found in plugin".into()).to_string(),
            "Failed to load plugin: No audio effect class found in plugin"
        );
        assert_eq!(
            ControlError::TimedOut(Operation::Unload).to_string(),
            "Unload plugin timed out"
        );
    }
}
