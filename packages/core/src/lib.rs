//! hostforge-core - Core library for hostforge
//!
//! Provisions a single virtual or cloud host through a pluggable driver and
//! records it as a managed machine. Shared by the `hostforge` CLI and its
//! HTTP service.

pub mod config;
pub mod driver;
pub mod host;
pub mod version;

// Re-export commonly used items for convenience
pub use config::{Config, load_config};
pub use driver::{Driver, DriverError, DriverFlags, DriverRegistry, FlagValue, SshClientType};
pub use host::{
    CrashReport, ErrorKind, FilesystemStore, Host, HostOptions, HostRequest, ProvisionError,
    Provisioner, ProvisionerSettings, Store, StoreError,
};
pub use version::{get_version, get_version_long};
