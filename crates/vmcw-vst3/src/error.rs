//! Error types for hosting a plugin module.

use std::path::PathBuf;

/// Failure to open a plugin module or find a usable class in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The shared library could not be opened.
    Open(String),
    /// The bundle has no binary for this platform.
    BinaryNotFound(PathBuf),
    /// A required export is missing.
    MissingSymbol(&'static str),
    /// The platform entry function returned false.
    EntryFailed,
    /// `GetPluginFactory` returned null.
    NullFactory,
    /// The factory lists no "Audio Module Class".
    NoAudioEffectClass,
}

impl std::fmt::Display for ModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(reason) => write!(f, "module open error: {reason}"),
            Self::BinaryNotFound(path) => {
                write!(f, "module open error: no binary at {}", path.display())
            }
            Self::MissingSymbol(name) => write!(f, "module open error: {name} not exported"),
            Self::EntryFailed => write!(f, "module open error: entry function returned false"),
            Self::NullFactory => write!(f, "module open error: GetPluginFactory returned null"),
            Self::NoAudioEffectClass => write!(f, "No audio effect class found in plugin"),
        }
    }
}

impl std::error::Error for ModuleError {}

/// Failure of a load issued by one of the wrapper identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The registry could not open the module.
    Module(ModuleError),
    /// The processing-side object could not be created or initialized.
    ComponentSetup(&'static str),
    /// The hosted edit controller could not be created or initialized.
    ControllerSetup,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module(e) => write!(f, "{e}"),
            Self::ComponentSetup(step) => write!(f, "Failed to set up hosted component: {step}"),
            Self::ControllerSetup => write!(f, "Failed to set up hosted controller"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Module(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ModuleError> for LoadError {
    fn from(e: ModuleError) -> Self {
        Self::Module(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_texts() {
        assert_eq!(
            LoadError::from(ModuleError::NoAudioEffectClass).to_string(),
            "No audio effect class found in plugin"
        );
        assert_eq!(
            LoadError::ControllerSetup.to_string(),
            "Failed to set up hosted controller"
        );
        assert!(ModuleError::Open("nope".into())
            .to_string()
            .starts_with("module open error"));
    }
}
