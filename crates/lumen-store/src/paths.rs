//! Platform-specific locations for preset files and configuration.
//!
//! # Directory Structure
//!
//! - **Data** (tier files): `~/.local/share/lumen/` (Linux),
//!   `~/Library/Application Support/lumen/` (macOS), `%LOCALAPPDATA%\lumen\` (Windows)
//! - **Config**: `~/.config/lumen/` (Linux), `~/Library/Application Support/lumen/` (macOS),
//!   `%APPDATA%\lumen\` (Windows)
//!
//! # Example
//!
//! ```rust,no_run
//! use lumen_store::{StdFs, paths};
//!
//! let dir = paths::ensure_data_dir().unwrap();
//! let fs = StdFs::new(dir);
//! ```

use std::path::{Path, PathBuf};

use crate::StoreError;

/// Application name used for directory paths.
const APP_NAME: &str = "lumen";

/// File name of the scheduler configuration.
const CONFIG_FILE: &str = "lumen.toml";

/// Returns the directory holding `presets.json` and `tmp.json`.
///
/// Falls back to `./lumen` if the platform data directory cannot be determined.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific configuration directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default scheduler configuration file path.
pub fn config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Ensure the data directory exists.
///
/// # Errors
///
/// Returns [`StoreError::CreateDir`] if the directory cannot be created.
pub fn ensure_data_dir() -> Result<PathBuf, StoreError> {
    let dir = data_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Create `dir` and its parents if they don't exist.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::create_dir(dir, e))?;
    }
    Ok(())
}
