//! Student store location.
//!
//! The store lives in the platform data directory unless `--db` is given:
//! - Linux: `~/.local/share/orientation/`
//! - macOS: `~/Library/Application Support/orientation/`
//! - Windows: `%APPDATA%\orientation\`

use orientation_data::{DataError, SqliteStudentStore};
use std::path::{Path, PathBuf};

/// Default store database path.
pub(crate) fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orientation")
        .join("students.db")
}

/// Open the store, creating its directory if needed.
pub(crate) fn open_store(path: Option<&Path>) -> Result<SqliteStudentStore, DataError> {
    let path = path.map_or_else(default_store_path, Path::to_path_buf);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    SqliteStudentStore::new(&path)
}
