//! VST3 export macro and entry points.

/// Generate VST3 entry points for the wrapper.
///
/// Emits `GetPluginFactory` plus the platform module entry/exit functions.
/// The factory installs the fallback logger on first use.
///
/// # Arguments
///
/// * `$config` - A `static` [`WrapperConfig`](vmcw_core::WrapperConfig)
///
/// # Example
///
/// ```rust,ignore
/// use vmcw_vst3::{export_vst3, WrapperConfig};
///
/// static CONFIG: WrapperConfig = WrapperConfig::new("VST3 MCP Wrapper")
///     .with_vendor("My Company");
///
/// export_vst3!(CONFIG);
/// ```
#[macro_export]
macro_rules! export_vst3 {
    ($config:expr) => {
        #[cfg(target_os = "windows")]
        #[no_mangle]
        extern "system" fn InitDll() -> bool {
            true
        }

        #[cfg(target_os = "windows")]
        #[no_mangle]
        extern "system" fn ExitDll() -> bool {
            true
        }

        // Must be lowercase on macOS.
        #[cfg(target_os = "macos")]
        #[no_mangle]
        extern "system" fn bundleEntry(_bundle_ref: *mut std::ffi::c_void) -> bool {
            true
        }

        #[cfg(target_os = "macos")]
        #[no_mangle]
        extern "system" fn bundleExit() -> bool {
            true
        }

        #[cfg(target_os = "linux")]
        #[no_mangle]
        extern "system" fn ModuleEntry(_library_handle: *mut std::ffi::c_void) -> bool {
            true
        }

        #[cfg(target_os = "linux")]
        #[no_mangle]
        extern "system" fn ModuleExit() -> bool {
            true
        }

        #[no_mangle]
        extern "system" fn GetPluginFactory() -> *mut std::ffi::c_void {
            use $crate::vst3::ComWrapper;
            use $crate::Factory;

            $crate::vmcw_core::logging::init();

            ComWrapper::new(Factory::new(&$config))
                .to_com_ptr::<$crate::vst3::Steinberg::IPluginFactory>()
                .map(|factory| factory.into_raw() as *mut std::ffi::c_void)
                .unwrap_or(std::ptr::null_mut())
        }
    };
}
