//! Process-wide registry of the hosted plugin module.
//!
//! The host instantiates the processing and control identities as unrelated
//! objects, so the module they both drive lives here. Each identity receives
//! an `Arc<HostedModuleRegistry>` at construction; the exported factory
//! passes [`HostedModuleRegistry::shared`].

use std::sync::{Arc, OnceLock};

use log::{info, warn};
use parking_lot::Mutex;
use vmcw_core::{ParamChange, ParamQueue};
use vst3::ComPtr;
use vst3::Steinberg::Vst::IComponent;
use vst3::Steinberg::TUID;

use crate::error::ModuleError;
use crate::module::HostedModule;

#[derive(Default)]
struct RegistryInner {
    module: Option<Arc<HostedModule>>,
    path: String,
    effect_cid: Option<TUID>,
    controller_cid: Option<TUID>,
    hosted_component: Option<ComPtr<IComponent>>,
}

impl RegistryInner {
    /// Clear derived state first, then drop the module handle.
    fn reset(&mut self) {
        self.hosted_component = None;
        self.controller_cid = None;
        self.effect_cid = None;
        self.path.clear();
        self.module = None;
    }
}

/// Shared owner of the loaded module and the pending parameter changes.
pub struct HostedModuleRegistry {
    inner: Mutex<RegistryInner>,
    params: ParamQueue,
}

// SAFETY: The hosted component pointer is only handed out as a counted
// reference under the lock; lifecycle calls on it happen on the main thread
// or the dispatch worker, never concurrently.
unsafe impl Send for HostedModuleRegistry {}
// SAFETY: See the Send impl above.
unsafe impl Sync for HostedModuleRegistry {}

static SHARED: OnceLock<Arc<HostedModuleRegistry>> = OnceLock::new();

impl HostedModuleRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            params: ParamQueue::new(),
        }
    }

    /// The registry shared by every identity in this process.
    pub fn shared() -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Open the module at `path`. Loading the path that is already loaded
    /// is a no-op.
    pub fn load(&self, path: &str) -> Result<(), ModuleError> {
        self.load_with(path, HostedModule::open)
    }

    /// [`load`](Self::load) with a custom opener.
    pub fn load_with<F>(&self, path: &str, open: F) -> Result<(), ModuleError>
    where
        F: FnOnce(&str) -> Result<HostedModule, ModuleError>,
    {
        let mut inner = self.inner.lock();
        if inner.module.is_some() && inner.path == path {
            return Ok(());
        }

        inner.reset();
        self.params.clear();

        let module = match open(path) {
            Ok(module) => module,
            Err(e) => {
                warn!("Failed to load plugin {path}: {e}");
                return Err(e);
            }
        };
        let effect_cid = match module.find_effect_class() {
            Ok(cid) => cid,
            Err(e) => {
                warn!("Failed to load plugin {path}: {e}");
                return Err(e);
            }
        };

        inner.module = Some(Arc::new(module));
        inner.effect_cid = Some(effect_cid);
        inner.path = path.to_string();
        info!("Loaded plugin module {path}");
        Ok(())
    }

    /// Release the module and clear every derived field. Idempotent.
    pub fn unload(&self) {
        let module = {
            let mut inner = self.inner.lock();
            let module = inner.module.take();
            inner.reset();
            module
        };
        self.params.clear();
        if let Some(module) = module {
            info!("Unloaded plugin module {}", module.path());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().module.is_some()
    }

    /// Path of the loaded module, empty when nothing is loaded.
    pub fn path(&self) -> String {
        self.inner.lock().path.clone()
    }

    /// Counted handle to the loaded module.
    pub fn module(&self) -> Option<Arc<HostedModule>> {
        self.inner.lock().module.clone()
    }

    pub fn effect_class_id(&self) -> Option<TUID> {
        self.inner.lock().effect_cid
    }

    pub fn set_controller_class_id(&self, cid: TUID) {
        self.inner.lock().controller_cid = Some(cid);
    }

    pub fn has_controller_class_id(&self) -> bool {
        self.inner.lock().controller_cid.is_some()
    }

    pub fn controller_class_id(&self) -> Option<TUID> {
        self.inner.lock().controller_cid
    }

    /// Publish (or clear) the processing-side object of the hosted plugin.
    pub fn set_hosted_component(&self, component: Option<ComPtr<IComponent>>) {
        self.inner.lock().hosted_component = component;
    }

    pub fn hosted_component(&self) -> Option<ComPtr<IComponent>> {
        self.inner.lock().hosted_component.clone()
    }

    /// Queue an out-of-band parameter change. Returns `false` when dropped.
    pub fn push_param_change(&self, id: u32, value: f64) -> bool {
        self.params.push(id, value)
    }

    /// Move every queued change into `out`. Never blocks.
    pub fn drain_param_changes(&self, out: &mut Vec<ParamChange>) {
        self.params.drain_into(out);
    }

    pub fn pending_param_changes(&self) -> usize {
        self.params.len()
    }
}

impl Default for HostedModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
