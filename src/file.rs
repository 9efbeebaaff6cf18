//! Raw file access for file-backed stores, and config path resolution.
//!
//! Reads treat a missing file as "no data" rather than an error. Writes
//! replace the whole file in one `std::fs::write` call: there is no
//! temp-file-and-rename step, so an interrupted write can leave a truncated
//! file behind. Parent directories are not created on write.

use std::path::{Path, PathBuf};

use crate::error::ConfigsError;

/// Read a file to a string. `Ok(None)` when the file does not exist; other
/// I/O errors (permissions, the path being a directory) are propagated.
pub fn read_optional(path: &Path) -> Result<Option<String>, ConfigsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigsError::IoError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Overwrite `path` with `content`.
pub fn write(path: &Path, content: &str) -> Result<(), ConfigsError> {
    std::fs::write(path, content).map_err(|e| ConfigsError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve `{platform config dir}/{app_name}/{file_name}` (XDG on Linux,
/// ~/Library/Application Support on macOS) and make sure the directory exists.
pub fn platform_config_path(app_name: &str, file_name: &str) -> Result<PathBuf, ConfigsError> {
    let proj = directories::ProjectDirs::from("", "", app_name)
        .ok_or_else(|| ConfigsError::NoConfigDir(app_name.into()))?;
    let dir = proj.config_dir();
    std::fs::create_dir_all(dir).map_err(|e| ConfigsError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(dir.join(file_name))
}
