//! XDG-style path resolution for hostforge
//!
//! - Config: `~/.config/hostforge/config.json`
//! - Storage (machines, certs): `~/.local/share/hostforge/`, overridable
//!   with `HOSTFORGE_STORAGE_PATH`

use std::path::{Path, PathBuf};

/// Environment variable overriding the storage base directory
pub const STORAGE_PATH_ENV: &str = "HOSTFORGE_STORAGE_PATH";

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config").join("hostforge"))
    }
    #[cfg(target_os = "windows")]
    {
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("hostforge"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Get the full path to the config file
///
/// Returns: `{config_dir}/config.json`
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("config.json"))
}

/// Get the default storage base directory
///
/// Honours `HOSTFORGE_STORAGE_PATH` when set and non-empty.
pub fn get_base_dir() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(STORAGE_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        directories::BaseDirs::new().map(|dirs| {
            dirs.home_dir()
                .join(".local")
                .join("share")
                .join("hostforge")
        })
    }
    #[cfg(target_os = "windows")]
    {
        directories::BaseDirs::new().map(|dirs| dirs.data_local_dir().join("hostforge"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Directory holding one subdirectory per machine
pub fn machines_dir(base: &Path) -> PathBuf {
    base.join("machines")
}

/// Directory holding the CA and client certificates
pub fn cert_dir(base: &Path) -> PathBuf {
    base.join("certs")
}
