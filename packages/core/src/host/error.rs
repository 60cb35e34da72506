//! Host creation error types
//!
//! Every failure of the creation workflow is classified into exactly one
//! [`ProvisionError`] variant.

use serde::Serialize;
use thiserror::Error;

use super::crash::CrashReport;
use super::create::CreationState;
use super::storage::StoreError;
use crate::driver::{DriverError, RegistryError};

/// Errors that can occur while creating a host
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Host name failed validation
    #[error(
        "Error creating machine: invalid host name {name:?}. Names start with a letter or digit and may contain 0-9a-zA-Z . -"
    )]
    InvalidIdentity { name: String },

    /// Swarm discovery URL has no scheme
    #[error("Swarm Discovery URL was in the wrong format: {0}")]
    InvalidSwarmDiscovery(String),

    /// A host with this name is already recorded
    #[error("Host already exists: \"{name}\"")]
    HostAlreadyExists { name: String },

    /// No backend registered under the requested driver name
    #[error("Driver \"{0}\" not found")]
    UnknownDriver(String),

    /// The base driver configuration could not be encoded or decoded
    #[error("Error attempting to build driver data: {0}")]
    MalformedConfig(String),

    /// The driver refused the supplied parameters
    #[error("Error setting machine configuration from flags provided: {source}")]
    ConfigRejected {
        driver: String,
        #[source]
        source: DriverError,
    },

    /// The backend failed to provision the host
    #[error("Error creating machine: {0}")]
    CreationFailed(Box<CrashReport>),

    /// The backend created the host but its record was not saved
    #[error(
        "Host \"{name}\" was created by the driver but could not be saved; the backend resource may be orphaned: {source}"
    )]
    PersistFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The store could not be queried
    #[error("Error checking if host exists: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The caller cancelled the request or its deadline passed
    #[error("Host creation cancelled while {state}")]
    Cancelled { state: CreationState },
}

impl From<RegistryError> for ProvisionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownDriver(name) => ProvisionError::UnknownDriver(name),
            RegistryError::MalformedConfig(e) => ProvisionError::MalformedConfig(e.to_string()),
        }
    }
}

/// Stable classification of a [`ProvisionError`], used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIdentity,
    InvalidSwarmDiscovery,
    HostAlreadyExists,
    UnknownDriver,
    MalformedConfig,
    ConfigRejected,
    CreationFailed,
    PersistFailed,
    StoreUnavailable,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentity => "invalid_identity",
            ErrorKind::InvalidSwarmDiscovery => "invalid_swarm_discovery",
            ErrorKind::HostAlreadyExists => "host_already_exists",
            ErrorKind::UnknownDriver => "unknown_driver",
            ErrorKind::MalformedConfig => "malformed_config",
            ErrorKind::ConfigRejected => "config_rejected",
            ErrorKind::CreationFailed => "creation_failed",
            ErrorKind::PersistFailed => "persist_failed",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether resubmitting the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::StoreUnavailable | ErrorKind::Cancelled)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::InvalidIdentity { .. } => ErrorKind::InvalidIdentity,
            ProvisionError::InvalidSwarmDiscovery(_) => ErrorKind::InvalidSwarmDiscovery,
            ProvisionError::HostAlreadyExists { .. } => ErrorKind::HostAlreadyExists,
            ProvisionError::UnknownDriver(_) => ErrorKind::UnknownDriver,
            ProvisionError::MalformedConfig(_) => ErrorKind::MalformedConfig,
            ProvisionError::ConfigRejected { .. } => ErrorKind::ConfigRejected,
            ProvisionError::CreationFailed(_) => ErrorKind::CreationFailed,
            ProvisionError::PersistFailed { .. } => ErrorKind::PersistFailed,
            ProvisionError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            ProvisionError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Crash report attached to a creation failure
    pub fn crash_report(&self) -> Option<&CrashReport> {
        match self {
            ProvisionError::CreationFailed(report) => Some(&**report),
            _ => None,
        }
    }

    /// Whether a backend resource may exist without a matching host record
    ///
    /// True once the driver's create call has started and the record was
    /// not written. Saves are never cancelled, so a cancellation can only
    /// leave a backend resource behind while creating.
    pub fn may_have_orphaned_resource(&self) -> bool {
        match self {
            ProvisionError::PersistFailed { .. } => true,
            ProvisionError::Cancelled { state } => *state == CreationState::Creating,
            _ => false,
        }
    }
}
