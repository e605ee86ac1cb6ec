// ── Engram: Project Scanner ─────────────────────────────────────────────────
//
// Lists the files the fingerprint map covers. The walk is sorted so the
// same tree always yields the same list in the same order. Unreadable
// directories are logged and skipped; one bad directory never aborts the scan.

use crate::atoms::engram_types::FingerprintConfig;
use crate::atoms::error::{EngramError, EngramResult};
use std::path::Path;

/// Project-relative, `/`-separated paths of every eligible file under
/// `config.project_root`.
pub fn scan_project(config: &FingerprintConfig) -> EngramResult<Vec<String>> {
    let root = &config.project_root;
    if !root.is_dir() {
        return Err(EngramError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("project root '{}' is not a directory", root.display()),
        )));
    }

    let mut files = Vec::new();
    walk(root, "", config, &mut files);

    if files.len() >= config.max_files {
        log::warn!(
            "[engram:scan] Stopped at {} files under {} (max_files)",
            config.max_files,
            root.display()
        );
    }
    log::debug!("[engram:scan] {} files under {}", files.len(), root.display());
    Ok(files)
}

fn wanted_extension(name: &str, config: &FingerprintConfig) -> bool {
    if config.extensions.is_empty() {
        return true;
    }
    match Path::new(name).extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            config.extensions.iter().any(|e| *e == ext)
        }
        None => false,
    }
}

fn walk(dir: &Path, prefix: &str, config: &FingerprintConfig, files: &mut Vec<String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            log::warn!("[engram:scan] Skipping {}: {}", dir.display(), err);
            return;
        }
    };
    let mut items: Vec<_> = entries.flatten().collect();
    items.sort_by_key(|e| e.file_name());

    for entry in items {
        if files.len() >= config.max_files {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if config.ignored_dirs.iter().any(|d| *d == name) {
                continue;
            }
            walk(&entry.path(), &rel, config, files);
        } else if file_type.is_file() && wanted_extension(&name, config) {
            files.push(rel);
        }
    }
}
