//! Configuration schema for hostforge
//!
//! Defines the structure and defaults for the config.json file.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use super::paths::get_base_dir;
use crate::driver::SshClientType;

/// Main configuration structure for hostforge
///
/// Serialized to/from `~/.config/hostforge/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config file version for migrations
    pub version: u32,

    /// Storage base directory holding `machines/` and `certs/`
    /// (default: `HOSTFORGE_STORAGE_PATH` or `~/.local/share/hostforge`)
    #[serde(default)]
    pub storage_path: Option<String>,

    /// SSH client handed to drivers (default: "external")
    #[serde(default)]
    pub ssh_client_type: SshClientType,

    /// Milliseconds to wait for backend logs to flush after a failed
    /// create, before looking for the crash log (default: 2000)
    #[serde(default = "default_log_flush_grace_ms")]
    pub log_flush_grace_ms: u64,

    /// Upper bound on a whole creation request in seconds (default: none)
    #[serde(default)]
    pub create_timeout_secs: Option<u64>,

    /// Bind address for `hostforge serve` (default: "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port for `hostforge serve` (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_log_flush_grace_ms() -> u64 {
    2000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Validate and parse a bind address string
///
/// Accepts IPv4, IPv6 (optionally bracketed) and "localhost".
pub fn validate_bind_address(addr: &str) -> Result<IpAddr, String> {
    let trimmed = addr.trim();

    if trimmed.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    let stripped = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    stripped.parse::<IpAddr>().map_err(|_| {
        format!(
            "Invalid IP address: '{}'. Use 127.0.0.1, ::1, 0.0.0.0, ::, or localhost",
            addr
        )
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            storage_path: None,
            ssh_client_type: SshClientType::default(),
            log_flush_grace_ms: default_log_flush_grace_ms(),
            create_timeout_secs: None,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the storage base directory
    ///
    /// An explicit `storage_path` wins over the environment and platform default.
    pub fn storage_base(&self) -> Option<PathBuf> {
        match self.storage_path.as_deref() {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => get_base_dir(),
        }
    }

    /// Grace period before crash-log collection
    pub fn log_flush_grace(&self) -> Duration {
        Duration::from_millis(self.log_flush_grace_ms)
    }

    /// Optional deadline for a whole creation request
    pub fn create_timeout(&self) -> Option<Duration> {
        self.create_timeout_secs.map(Duration::from_secs)
    }
}
