//! Host creation
//!
//! Provides the pieces of the host creation workflow:
//! - Host data model and option assembly
//! - Name and swarm discovery validation
//! - The machine store
//! - Crash reports for failed creation
//! - The [`Provisioner`] that sequences them

mod crash;
mod create;
mod error;
mod options;
mod schema;
mod storage;
mod validate;

// Public exports
pub use crash::{CrashReport, backend_log_path};
pub use create::{
    CreationState, DEFAULT_LOG_FLUSH_GRACE, NameValidator, Provisioner, ProvisionerSettings,
};
pub use error::{ErrorKind, ProvisionError};
pub use options::{CertPaths, HostRequest, OptionDefaults, build_host_options};
pub use schema::{
    AuthOptions, EngineOptions, HOST_RECORD_VERSION, Host, HostOptions, HostRecord, SwarmOptions,
};
pub use storage::{FilesystemStore, Store, StoreError};
pub use validate::{validate_host_name, validate_swarm_discovery};
