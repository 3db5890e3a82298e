//! Dynamic loading of a hosted plugin module.
//!
//! A [`HostedModule`] owns the shared library, its `IPluginFactory`, and the
//! platform exit function. Teardown order is fixed: the factory reference is
//! released, then the exit function runs, then the library is unloaded.
//! Objects created from the module keep an `Arc<HostedModule>` so the
//! library outlives every instance.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, info};
use vst3::Steinberg::{
    kResultOk, FIDString, IPluginFactory, IPluginFactoryTrait, PClassInfo, TUID,
};
use vst3::{ComPtr, Interface};

use crate::error::ModuleError;
use crate::util::{cstring_to_string, iid_of};

/// Category of an audio processing class.
pub const AUDIO_EFFECT_CATEGORY: &str = "Audio Module Class";

/// Category of an edit controller class.
pub const CONTROLLER_CATEGORY: &str = "Component Controller Class";

type ExitFn = unsafe extern "C" fn() -> bool;
type GetFactoryFn = unsafe extern "C" fn() -> *mut IPluginFactory;

/// One entry of the factory's class list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub cid: TUID,
    pub category: String,
    pub name: String,
}

/// A successful module entry call, paired with the matching exit call.
///
/// Dropping the guard runs the exit function and then unloads the library,
/// so every path out of [`HostedModule::open`] after the entry succeeded
/// balances it.
struct EntryGuard {
    exit_fn: Option<ExitFn>,
    // Unloaded after exit_fn has run.
    library: Option<Library>,
}

impl EntryGuard {
    fn new(library: Option<Library>, exit_fn: Option<ExitFn>) -> Self {
        Self { exit_fn, library }
    }

    /// Call the library's `GetPluginFactory`.
    fn factory(&self) -> Result<ComPtr<IPluginFactory>, ModuleError> {
        let library = self
            .library
            .as_ref()
            .ok_or(ModuleError::MissingSymbol("GetPluginFactory"))?;
        // SAFETY: GetPluginFactory has this signature in every VST3 module.
        let get_factory: Symbol<'_, GetFactoryFn> = unsafe { library.get(b"GetPluginFactory") }
            .map_err(|_| ModuleError::MissingSymbol("GetPluginFactory"))?;
        // SAFETY: Calling the exported factory function.
        let raw = unsafe { get_factory() };
        // SAFETY: The returned pointer carries one reference we now own.
        unsafe { ComPtr::from_raw(raw) }.ok_or(ModuleError::NullFactory)
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        if let Some(exit) = self.exit_fn.take() {
            // SAFETY: The library is still loaded; it drops after this.
            unsafe { exit() };
        }
    }
}

/// A loaded plugin binary and its factory.
pub struct HostedModule {
    path: String,
    factory: ManuallyDrop<ComPtr<IPluginFactory>>,
    // Dropped after the factory is released in Drop below.
    _entry: Option<EntryGuard>,
}

// SAFETY: The factory is only driven from lifecycle code, which the
// wrapper serializes (main thread or the single dispatch worker). Sharing
// the handle across threads only moves the reference count.
unsafe impl Send for HostedModule {}
// SAFETY: See the Send impl above.
unsafe impl Sync for HostedModule {}

/// Resolve the shared library inside a `.vst3` bundle. Plain files are
/// returned unchanged.
pub fn binary_path(path: &Path) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let contents = path.join("Contents");

    #[cfg(target_os = "macos")]
    let binary = contents.join("MacOS").join(&stem);

    #[cfg(target_os = "windows")]
    let binary = contents.join("x86_64-win").join(format!("{stem}.vst3"));

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let binary = contents
        .join(format!("{}-linux", std::env::consts::ARCH))
        .join(format!("{stem}.so"));

    binary
}

impl HostedModule {
    /// Open the module at `path` (bundle directory or binary), run its entry
    /// function and fetch the factory.
    pub fn open(path: &str) -> Result<Self, ModuleError> {
        let binary = binary_path(Path::new(path));
        if !binary.exists() {
            return Err(ModuleError::BinaryNotFound(binary));
        }

        // SAFETY: Loading a plugin binary runs its initializers; trusting the
        // hosted plugin is inherent to hosting it.
        let library =
            unsafe { Library::new(&binary) }.map_err(|e| ModuleError::Open(e.to_string()))?;

        // SAFETY: Symbol signatures follow the VST3 module entry conventions.
        unsafe { Self::call_entry(&library)? };

        // SAFETY: The exit function takes no arguments. The pointer is only
        // called by EntryGuard while it still owns the library.
        let exit_fn = unsafe { library.get::<ExitFn>(Self::EXIT_SYMBOL) }
            .ok()
            .map(|symbol| *symbol);
        let module = Self::with_entry(EntryGuard::new(Some(library), exit_fn), path)?;
        info!("Opened plugin module {}", binary.display());
        Ok(module)
    }

    /// Finish opening a module whose entry function already succeeded.
    fn with_entry(entry: EntryGuard, path: &str) -> Result<Self, ModuleError> {
        let factory = entry.factory()?;
        Ok(Self {
            path: path.to_string(),
            factory: ManuallyDrop::new(factory),
            _entry: Some(entry),
        })
    }

    /// Wrap an already created factory. Used for in-process factories that
    /// have no library behind them.
    pub fn from_factory(factory: ComPtr<IPluginFactory>, path: &str) -> Self {
        Self {
            path: path.to_string(),
            factory: ManuallyDrop::new(factory),
            _entry: None,
        }
    }

    #[cfg(target_os = "macos")]
    const EXIT_SYMBOL: &'static [u8] = b"bundleExit";
    #[cfg(target_os = "windows")]
    const EXIT_SYMBOL: &'static [u8] = b"ExitDll";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    const EXIT_SYMBOL: &'static [u8] = b"ModuleExit";

    #[cfg(not(target_os = "windows"))]
    unsafe fn call_entry(library: &Library) -> Result<(), ModuleError> {
        #[cfg(target_os = "macos")]
        const ENTRY: (&[u8], &str) = (b"bundleEntry", "bundleEntry");
        #[cfg(not(target_os = "macos"))]
        const ENTRY: (&[u8], &str) = (b"ModuleEntry", "ModuleEntry");

        // SAFETY: Entry takes the platform bundle/library handle; null is
        // accepted by SDK-based modules.
        let entry: Symbol<'_, unsafe extern "C" fn(*mut c_void) -> bool> =
            unsafe { library.get(ENTRY.0) }.map_err(|_| ModuleError::MissingSymbol(ENTRY.1))?;
        // SAFETY: Calling the module entry function once after load.
        if unsafe { entry(std::ptr::null_mut()) } {
            Ok(())
        } else {
            Err(ModuleError::EntryFailed)
        }
    }

    #[cfg(target_os = "windows")]
    unsafe fn call_entry(library: &Library) -> Result<(), ModuleError> {
        // InitDll is optional on Windows.
        // SAFETY: InitDll takes no arguments.
        match unsafe { library.get::<unsafe extern "system" fn() -> bool>(b"InitDll") } {
            // SAFETY: Calling the module entry function once after load.
            Ok(entry) if !unsafe { entry() } => Err(ModuleError::EntryFailed),
            _ => Ok(()),
        }
    }

    /// Path this module was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every class the factory lists.
    pub fn class_infos(&self) -> Vec<ClassInfo> {
        // SAFETY: The factory is live for self.
        let count = unsafe { self.factory.countClasses() }.max(0);
        let mut classes = Vec::with_capacity(count as usize);
        for index in 0..count {
            // SAFETY: PClassInfo is plain data; all-zero is a valid value.
            let mut info: PClassInfo = unsafe { std::mem::zeroed() };
            // SAFETY: info is a valid out-parameter.
            if unsafe { self.factory.getClassInfo(index, &mut info) } != kResultOk {
                continue;
            }
            classes.push(ClassInfo {
                cid: info.cid,
                category: cstring_to_string(&info.category),
                name: cstring_to_string(&info.name),
            });
        }
        classes
    }

    /// Id of the first class in the audio effect category.
    pub fn find_effect_class(&self) -> Result<TUID, ModuleError> {
        self.class_infos()
            .into_iter()
            .find(|class| class.category == AUDIO_EFFECT_CATEGORY)
            .map(|class| {
                debug!("Using audio effect class '{}'", class.name);
                class.cid
            })
            .ok_or(ModuleError::NoAudioEffectClass)
    }

    /// Instantiate class `cid` and query interface `I` on it.
    pub fn create_instance<I: Interface>(&self, cid: &TUID) -> Option<ComPtr<I>> {
        let iid = iid_of::<I>();
        let mut obj: *mut c_void = std::ptr::null_mut();
        // SAFETY: cid and iid are 16-byte ids; obj is a valid out-parameter.
        let result = unsafe {
            self.factory.createInstance(
                cid.as_ptr() as FIDString,
                iid.as_ptr() as FIDString,
                &mut obj,
            )
        };
        if result != kResultOk {
            return None;
        }
        // SAFETY: On success obj is an owned reference to interface I.
        unsafe { ComPtr::from_raw(obj as *mut I) }
    }
}

impl Drop for HostedModule {
    fn drop(&mut self) {
        // SAFETY: The factory is dropped exactly once, here. The entry
        // guard drops afterwards and runs the exit function.
        unsafe { ManuallyDrop::drop(&mut self.factory) };
        debug!("Released plugin module {}", self.path);
    }
}
