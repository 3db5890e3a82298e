//! VST3 bundle layout and installation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::util::{copy_dir_all, shorten_path, to_vst3_bundle_name};

/// Directory under `Contents/` holding the binary on this platform.
fn binary_dir() -> &'static str {
    if cfg!(target_os = "macos") {
        "MacOS"
    } else if cfg!(target_os = "windows") {
        "x86_64-win"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64-linux"
    } else {
        "x86_64-linux"
    }
}

/// Binary file name inside the bundle for a bundle stem.
fn binary_name(stem: &str) -> String {
    if cfg!(target_os = "macos") {
        stem.to_string()
    } else if cfg!(target_os = "windows") {
        format!("{}.vst3", stem)
    } else {
        format!("{}.so", stem)
    }
}

/// Create a `.vst3` bundle from a compiled library.
///
/// ```text
/// Vmcw.vst3/
/// └── Contents/
///     ├── Info.plist        (macOS)
///     ├── PkgInfo           (macOS)
///     └── <arch>-<os>/ or MacOS/
///         └── Vmcw[.so|.vst3]
/// ```
pub fn bundle_vst3(
    package: &str,
    version: &str,
    target_dir: &Path,
    library: &Path,
    verbose: bool,
) -> Result<PathBuf, String> {
    let bundle_name = to_vst3_bundle_name(package);
    let stem = bundle_name.trim_end_matches(".vst3");
    let bundle_dir = target_dir.join(&bundle_name);
    let contents_dir = bundle_dir.join("Contents");
    let binary_dir = contents_dir.join(binary_dir());

    crate::status!("  Creating VST3 bundle...");
    crate::verbose!(verbose, "    Path: {}", bundle_dir.display());

    if bundle_dir.exists() {
        fs::remove_dir_all(&bundle_dir).map_err(|e| format!("Failed to remove old bundle: {}", e))?;
    }
    fs::create_dir_all(&binary_dir).map_err(|e| format!("Failed to create bundle dir: {}", e))?;

    fs::copy(library, binary_dir.join(binary_name(stem)))
        .map_err(|e| format!("Failed to copy library: {}", e))?;

    if cfg!(target_os = "macos") {
        fs::write(contents_dir.join("Info.plist"), info_plist(package, stem, version))
            .map_err(|e| format!("Failed to write Info.plist: {}", e))?;
        fs::write(contents_dir.join("PkgInfo"), "BNDL????")
            .map_err(|e| format!("Failed to write PkgInfo: {}", e))?;
    }

    crate::status!("✓ {}", bundle_name);
    Ok(bundle_dir)
}

fn info_plist(package: &str, executable_name: &str, version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleDevelopmentRegion</key>
    <string>English</string>
    <key>CFBundleExecutable</key>
    <string>{executable_name}</string>
    <key>CFBundleIdentifier</key>
    <string>com.vmcw.{package}</string>
    <key>CFBundleInfoDictionaryVersion</key>
    <string>6.0</string>
    <key>CFBundleName</key>
    <string>{executable_name}</string>
    <key>CFBundlePackageType</key>
    <string>BNDL</string>
    <key>CFBundleSignature</key>
    <string>????</string>
    <key>CFBundleVersion</key>
    <string>{version}</string>
    <key>CFBundleShortVersionString</key>
    <string>{version}</string>
</dict>
</plist>
"#
    )
}

/// User VST3 directory for this platform.
fn user_vst3_dir() -> Result<PathBuf, String> {
    if cfg!(target_os = "windows") {
        let local = std::env::var("LOCALAPPDATA").map_err(|_| "LOCALAPPDATA not set")?;
        return Ok(PathBuf::from(local).join("Programs").join("Common").join("VST3"));
    }
    let home = PathBuf::from(std::env::var("HOME").map_err(|_| "HOME not set")?);
    if cfg!(target_os = "macos") {
        Ok(home.join("Library").join("Audio").join("Plug-Ins").join("VST3"))
    } else {
        Ok(home.join(".vst3"))
    }
}

/// Copy the bundle into the user VST3 directory, replacing any old copy.
pub fn install_vst3(bundle_dir: &Path, verbose: bool) -> Result<PathBuf, String> {
    let bundle_name = bundle_dir
        .file_name()
        .ok_or_else(|| format!("Invalid bundle path: {}", bundle_dir.display()))?;
    let vst3_dir = user_vst3_dir()?;
    fs::create_dir_all(&vst3_dir).map_err(|e| format!("Failed to create VST3 dir: {}", e))?;

    let dest = vst3_dir.join(bundle_name);
    if dest.exists() {
        fs::remove_dir_all(&dest).map_err(|e| format!("Failed to remove old installation: {}", e))?;
    }
    copy_dir_all(bundle_dir, &dest)?;

    crate::verbose!(verbose, "    Installed to: {}", dest.display());
    crate::status!("✓ {} → {}", bundle_name.to_string_lossy(), shorten_path(&dest));
    Ok(dest)
}
