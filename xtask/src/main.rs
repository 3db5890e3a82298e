//! Build tooling for the VST3 MCP wrapper.
//!
//! Usage: cargo xtask bundle [<package>] [--release] [--install] [--verbose]

mod build;
mod util;
mod vst3;

use std::path::PathBuf;
use std::process::Command;

use util::print_error;

/// Package built when none is named.
const DEFAULT_PACKAGE: &str = "vmcw";

struct BundleArgs {
    package: String,
    release: bool,
    install: bool,
    verbose: bool,
}

impl BundleArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut package = None;
        let mut release = false;
        let mut install = false;
        let mut verbose = false;

        for arg in args {
            match arg.as_str() {
                "--release" => release = true,
                "--install" => install = true,
                "--verbose" | "-v" => verbose = true,
                flag if flag.starts_with('-') => return Err(format!("Unknown option: {flag}")),
                name if package.is_none() => package = Some(name.to_string()),
                extra => return Err(format!("Unexpected argument: {extra}")),
            }
        }

        Ok(Self {
            package: package.unwrap_or_else(|| DEFAULT_PACKAGE.to_string()),
            release,
            install,
            verbose,
        })
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) != Some("bundle") {
        print_usage();
        std::process::exit(1);
    }

    let result = BundleArgs::parse(&args[1..]).and_then(|args| bundle(&args));
    if let Err(e) = result {
        print_error(&e);
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask bundle [<package>] [--release] [--install] [--verbose]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  bundle    Build the wrapper cdylib and lay out a .vst3 bundle");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --release    Build in release mode");
    eprintln!("  --install    Copy the bundle into the user VST3 directory");
    eprintln!("  --verbose    Print paths and intermediate steps");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  cargo xtask bundle --release");
    eprintln!("  cargo xtask bundle vmcw --release --install");
}

fn bundle(args: &BundleArgs) -> Result<(), String> {
    let workspace_root = get_workspace_root()?;
    let version = build::workspace_version(&workspace_root)?;

    crate::status!("Bundling {} {}", args.package, version);
    let library = build::build_native(&args.package, args.release, &workspace_root, args.verbose)?;

    let profile = if args.release { "release" } else { "debug" };
    let target_dir = workspace_root.join("target").join(profile);
    let bundle_dir = vst3::bundle_vst3(&args.package, &version, &target_dir, &library, args.verbose)?;

    if args.install {
        vst3::install_vst3(&bundle_dir, args.verbose)?;
    }
    Ok(())
}

fn get_workspace_root() -> Result<PathBuf, String> {
    let output = Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .map_err(|e| format!("Failed to locate workspace: {}", e))?;

    if !output.status.success() {
        return Err("Failed to locate workspace".to_string());
    }

    let cargo_toml = String::from_utf8_lossy(&output.stdout);
    let path = PathBuf::from(cargo_toml.trim());
    path.parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| "Invalid workspace path".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = BundleArgs::parse(&[]).unwrap();
        assert_eq!(parsed.package, DEFAULT_PACKAGE);
        assert!(!parsed.release);
        assert!(!parsed.install);
    }

    #[test]
    fn test_parse_flags_and_package() {
        let parsed = BundleArgs::parse(&args(&["my-wrapper", "--release", "--install"])).unwrap();
        assert_eq!(parsed.package, "my-wrapper");
        assert!(parsed.release);
        assert!(parsed.install);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(BundleArgs::parse(&args(&["--au"])).is_err());
        assert!(BundleArgs::parse(&args(&["a", "b"])).is_err());
    }
}
