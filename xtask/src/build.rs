//! Cargo invocation and build metadata.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

#[derive(Deserialize)]
struct Manifest {
    workspace: Option<Workspace>,
}

#[derive(Deserialize)]
struct Workspace {
    package: Option<WorkspacePackage>,
}

#[derive(Deserialize)]
struct WorkspacePackage {
    version: Option<String>,
}

/// Read `workspace.package.version` from the workspace Cargo.toml.
pub fn workspace_version(workspace_root: &Path) -> Result<String, String> {
    let cargo_toml_path = workspace_root.join("Cargo.toml");
    let cargo_toml = fs::read_to_string(&cargo_toml_path)
        .map_err(|e| format!("Failed to read Cargo.toml: {}", e))?;
    parse_workspace_version(&cargo_toml)
}

fn parse_workspace_version(cargo_toml: &str) -> Result<String, String> {
    let manifest: Manifest =
        toml::from_str(cargo_toml).map_err(|e| format!("Failed to parse Cargo.toml: {}", e))?;
    manifest
        .workspace
        .and_then(|w| w.package)
        .and_then(|p| p.version)
        .ok_or_else(|| "Could not find version in Cargo.toml".to_string())
}

/// File name cargo gives the cdylib of `package` on this platform.
pub fn library_file_name(package: &str) -> String {
    let lib_name = package.replace('-', "_");
    if cfg!(target_os = "windows") {
        format!("{}.dll", lib_name)
    } else if cfg!(target_os = "macos") {
        format!("lib{}.dylib", lib_name)
    } else {
        format!("lib{}.so", lib_name)
    }
}

/// Build `package` for the host target and return the library path.
pub fn build_native(
    package: &str,
    release: bool,
    workspace_root: &Path,
    verbose: bool,
) -> Result<PathBuf, String> {
    crate::status!("  Building {}...", package);

    let mut cmd = Command::new("cargo");
    cmd.arg("build").arg("-p").arg(package).current_dir(workspace_root);
    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().map_err(|e| format!("Failed to run cargo: {}", e))?;
    if !status.success() {
        return Err("Build failed".to_string());
    }

    let profile = if release { "release" } else { "debug" };
    let library = workspace_root
        .join("target")
        .join(profile)
        .join(library_file_name(package));

    if !library.exists() {
        return Err(format!("Built library not found: {}", library.display()));
    }

    crate::verbose!(verbose, "    Binary: {}", library.display());
    Ok(library)
}
