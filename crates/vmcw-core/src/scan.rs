//! Discovery of installed plugin bundles.
//!
//! Walks the platform's standard VST3 folders plus any directories listed in
//! `VST3_PATH`, collecting `*.vst3` entries. A bundle is a leaf: the walk
//! never descends into one.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::ENV_SCAN_PATH;

// =========================================================================
// Search paths
// =========================================================================

/// Platform-standard VST3 install folders.
pub fn platform_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "linux")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".vst3"));
        }
        paths.push(PathBuf::from("/usr/lib/vst3"));
        paths.push(PathBuf::from("/usr/local/lib/vst3"));
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join("Library/Audio/Plug-Ins/VST3"));
        }
        paths.push(PathBuf::from("/Library/Audio/Plug-Ins/VST3"));
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            paths.push(PathBuf::from(local).join("Programs/Common/VST3"));
        }
        match std::env::var_os("COMMONPROGRAMFILES") {
            Some(common) => paths.push(PathBuf::from(common).join("VST3")),
            None => paths.push(PathBuf::from(r"C:\Program Files\Common Files\VST3")),
        }
    }

    paths
}

/// Directories from a `VST3_PATH`-style list.
///
/// Both `:` and `;` separate entries so the same value works on every
/// platform, except that a `:` directly after a single drive letter is kept.
pub fn split_path_list(list: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for chunk in list.split(';') {
        let mut rest = chunk;
        while !rest.is_empty() {
            let bytes = rest.as_bytes();
            let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
            let search_from = if drive { 2 } else { 0 };
            match rest[search_from..].find(':') {
                Some(pos) => {
                    let (head, tail) = rest.split_at(search_from + pos);
                    if !head.trim().is_empty() {
                        out.push(PathBuf::from(head.trim()));
                    }
                    rest = &tail[1..];
                }
                None => {
                    if !rest.trim().is_empty() {
                        out.push(PathBuf::from(rest.trim()));
                    }
                    break;
                }
            }
        }
    }
    out
}

/// Extra directories from `VST3_PATH` followed by the platform defaults.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = std::env::var(ENV_SCAN_PATH)
        .map(|list| split_path_list(&list))
        .unwrap_or_default();
    paths.extend(platform_search_paths());
    paths
}

// =========================================================================
// Bundle walk
// =========================================================================

fn is_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("vst3"))
}

/// Find every `*.vst3` entry under `root`.
///
/// Bundle directories and single-file `.vst3` modules are both reported.
/// Directory links below `root` are not followed. Unreadable directories
/// are skipped.
pub fn find_bundles(root: &Path) -> Vec<PathBuf> {
    let mut bundles = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping entry under {}: {e}", root.display());
                continue;
            }
        };
        if !is_bundle(entry.path()) {
            continue;
        }
        if entry.file_type().is_dir() {
            walker.skip_current_dir();
        }
        bundles.push(entry.into_path());
    }

    bundles.sort();
    bundles
}

/// Scan `roots` and return sorted, de-duplicated bundle paths.
pub fn scan_roots<I, P>(roots: I) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut found = BTreeSet::new();
    for root in roots {
        let root = root.as_ref();
        if !root.is_dir() {
            continue;
        }
        for bundle in find_bundles(root) {
            found.insert(bundle.to_string_lossy().into_owned());
        }
    }
    found.into_iter().collect()
}

/// All installed plugins visible from [`search_paths`].
pub fn available_plugins() -> Vec<String> {
    scan_roots(search_paths())
}

// =========================================================================
// Tests
// =========================================================================
