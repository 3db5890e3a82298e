//! VST3 plugin factory.
//!
//! Exposes exactly two classes: the processing identity at index 0 and
//! the control identity at index 1. Both are built over the same
//! [`HostedModuleRegistry`], which is how the two halves share the hosted
//! module even though the host constructs them independently.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use vmcw_core::WrapperConfig;
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;
use vst3::{Class, ComWrapper};

use crate::controller::WrapperController;
use crate::processor::WrapperProcessor;
use crate::registry::HostedModuleRegistry;
use crate::util::{class_id, copy_cstring, copy_wstring};

const AUDIO_MODULE_CLASS: &str = "Audio Module Class";
const CONTROLLER_CLASS: &str = "Component Controller Class";
const SUBCATEGORIES: &str = "Fx";

/// Which of the two exported classes an index or cid refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportedClass {
    Processor,
    Controller,
}

/// Plugin factory for the wrapper.
pub struct Factory {
    config: &'static WrapperConfig,
    registry: Arc<HostedModuleRegistry>,
}

impl Factory {
    /// Factory over the process-wide registry.
    pub fn new(config: &'static WrapperConfig) -> Self {
        Self::with_registry(config, HostedModuleRegistry::shared())
    }

    pub fn with_registry(config: &'static WrapperConfig, registry: Arc<HostedModuleRegistry>) -> Self {
        Self { config, registry }
    }

    fn class_at(index: int32) -> Option<ExportedClass> {
        match index {
            0 => Some(ExportedClass::Processor),
            1 => Some(ExportedClass::Controller),
            _ => None,
        }
    }

    fn class_for(&self, cid: &TUID) -> Option<ExportedClass> {
        if cid == &class_id(self.config.processor_id) {
            Some(ExportedClass::Processor)
        } else if cid == &class_id(self.config.controller_id) {
            Some(ExportedClass::Controller)
        } else {
            None
        }
    }

    fn describe(&self, class: ExportedClass) -> (TUID, &'static str, String) {
        match class {
            ExportedClass::Processor => (
                class_id(self.config.processor_id),
                AUDIO_MODULE_CLASS,
                self.config.name.to_string(),
            ),
            ExportedClass::Controller => (
                class_id(self.config.controller_id),
                CONTROLLER_CLASS,
                self.config.controller_name(),
            ),
        }
    }
}

fn sdk_version() -> &'static str {
    // SAFETY: SDKVersionString is a static NUL-terminated string.
    unsafe { CStr::from_ptr(SDKVersionString) }
        .to_str()
        .unwrap_or("")
}

impl Class for Factory {
    type Interfaces = (IPluginFactory3,);
}

impl IPluginFactoryTrait for Factory {
    unsafe fn getFactoryInfo(&self, info: *mut PFactoryInfo) -> tresult {
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        let info = unsafe { &mut *info };
        copy_cstring(self.config.vendor, &mut info.vendor);
        copy_cstring(self.config.url, &mut info.url);
        copy_cstring(self.config.email, &mut info.email);
        info.flags = PFactoryInfo_::FactoryFlags_::kUnicode as int32;
        kResultOk
    }

    unsafe fn countClasses(&self) -> int32 {
        2
    }

    unsafe fn getClassInfo(&self, index: int32, info: *mut PClassInfo) -> tresult {
        let Some(class) = Self::class_at(index) else {
            return kInvalidArgument;
        };
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        let info = unsafe { &mut *info };
        let (cid, category, name) = self.describe(class);
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_cstring(category, &mut info.category);
        copy_cstring(&name, &mut info.name);
        kResultOk
    }

    unsafe fn createInstance(&self, cid: FIDString, iid: FIDString, obj: *mut *mut c_void) -> tresult {
        if cid.is_null() || obj.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Hosts pass 16-byte class ids.
        let cid = unsafe { &*(cid as *const TUID) };
        let unknown = match self.class_for(cid) {
            Some(ExportedClass::Processor) => {
                ComWrapper::new(WrapperProcessor::new(self.config, Arc::clone(&self.registry)))
                    .to_com_ptr::<FUnknown>()
            }
            Some(ExportedClass::Controller) => {
                ComWrapper::new(WrapperController::new(self.config, Arc::clone(&self.registry)))
                    .to_com_ptr::<FUnknown>()
            }
            None => return kInvalidArgument,
        };
        let Some(unknown) = unknown else {
            return kNoInterface;
        };
        let ptr = unknown.as_ptr();
        // SAFETY: ptr is a live FUnknown; iid and obj come from the host.
        unsafe { ((*(*ptr).vtbl).queryInterface)(ptr, iid as *const TUID, obj) }
    }
}

impl IPluginFactory2Trait for Factory {
    unsafe fn getClassInfo2(&self, index: int32, info: *mut PClassInfo2) -> tresult {
        let Some(class) = Self::class_at(index) else {
            return kInvalidArgument;
        };
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        let info = unsafe { &mut *info };
        let (cid, category, name) = self.describe(class);
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_cstring(category, &mut info.category);
        copy_cstring(&name, &mut info.name);
        info.classFlags = 0;
        copy_cstring(SUBCATEGORIES, &mut info.subCategories);
        copy_cstring(self.config.vendor, &mut info.vendor);
        copy_cstring(self.config.version, &mut info.version);
        copy_cstring(sdk_version(), &mut info.sdkVersion);
        kResultOk
    }
}

impl IPluginFactory3Trait for Factory {
    unsafe fn getClassInfoUnicode(&self, index: int32, info: *mut PClassInfoW) -> tresult {
        let Some(class) = Self::class_at(index) else {
            return kInvalidArgument;
        };
        if info.is_null() {
            return kInvalidArgument;
        }
        // SAFETY: Checked non-null.
        let info = unsafe { &mut *info };
        let (cid, category, name) = self.describe(class);
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_cstring(category, &mut info.category);
        copy_wstring(&name, &mut info.name);
        info.classFlags = 0;
        copy_cstring(SUBCATEGORIES, &mut info.subCategories);
        copy_wstring(self.config.vendor, &mut info.vendor);
        copy_wstring(self.config.version, &mut info.version);
        copy_wstring(sdk_version(), &mut info.sdkVersion);
        kResultOk
    }

    unsafe fn setHostContext(&self, _context: *mut FUnknown) -> tresult {
        kNotImplemented
    }
}
