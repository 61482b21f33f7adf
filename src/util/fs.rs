//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// Source file extensions, in scan order.
pub const SOURCE_EXTENSIONS: &[&str] = &["cpp", "h"];

/// List the sources of a directory: all `*.cpp` files, then all `*.h` files.
///
/// The listing is non-recursive and sorted within each extension so that
/// repeated runs see the same order on every platform.
pub fn list_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for ext in SOURCE_EXTENSIONS {
        let pattern = format!("{}/*.{}", glob::Pattern::escape(&dir.to_string_lossy()), ext);
        let mut batch = Vec::new();
        for entry in glob(&pattern).with_context(|| format!("invalid glob pattern: {}", pattern))? {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        batch.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
        batch.sort();
        results.extend(batch);
    }

    Ok(results)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a source file. Bytes that are not valid UTF-8 are replaced.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("{} is not valid UTF-8; decoding lossily", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Write a string to a file, creating parent directories if needed.
///
/// An existing file is replaced in full.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}
