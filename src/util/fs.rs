//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Collect every file under a directory, sorted by relative path.
///
/// Byte-compiled caches (`__pycache__` directories, `.pyc` files) are
/// always skipped; they are never distributable content.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.with_context(|| format!("failed to walk directory: {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if is_bytecode_artifact(&path) {
            continue;
        }
        results.push(path);
    }

    results.sort();
    Ok(results)
}

/// Find files matching glob patterns relative to a base directory.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        for entry in
            glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

fn is_bytecode_artifact(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pyc")
        || path.components().any(|c| c.as_os_str() == "__pycache__")
}

/// Canonicalize a path, falling back to the path as-is if it doesn't
/// exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Normalize permission bits to 644 (regular) or 755 (executable).
///
/// Version control only tracks the executable bit; the rest varies with
/// the local umask, so collapsing to two modes keeps archives reproducible.
pub fn normalize_file_mode(mode: u32) -> u32 {
    let mut new_mode = (mode | 0o644) & !0o133;
    if mode & 0o100 != 0 {
        new_mode |= 0o111;
    }
    new_mode
}

/// Render a path with forward slashes, as archive entries require.
pub fn archive_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
