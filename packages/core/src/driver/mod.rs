//! Provisioning drivers
//!
//! A driver knows how to bring up a compute instance on one backend
//! (local hypervisor, cloud API, out-of-process plugin). The host creation
//! workflow only ever talks to the [`Driver`] trait; the [`DriverRegistry`]
//! is the one place that turns a driver name into a concrete backend.

mod error;
mod flags;
mod none;
mod registry;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::DriverError;
pub use flags::{DriverFlags, FlagValue};
pub use none::{NONE_DRIVER_NAME, NoneDriver};
pub use registry::{DriverRegistry, RegistryError};

/// Which SSH client drivers should use when they reach the new host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshClientType {
    /// Shell out to the system `ssh` binary
    #[default]
    External,
    /// Use an in-process SSH implementation
    Native,
}

impl fmt::Display for SshClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshClientType::External => write!(f, "external"),
            SshClientType::Native => write!(f, "native"),
        }
    }
}

/// Process-level settings handed to every driver the registry builds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverContext {
    pub ssh_client: SshClientType,
}

/// Fields shared by every driver, decoded from the base configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseDriver {
    #[serde(rename = "MachineName")]
    pub machine_name: String,

    #[serde(rename = "StorePath", default)]
    pub store_path: String,

    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,

    #[serde(rename = "SSHUser", default)]
    pub ssh_user: String,

    #[serde(rename = "SSHPort", default)]
    pub ssh_port: u16,
}

impl BaseDriver {
    pub fn new(machine_name: impl Into<String>, store_path: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            store_path: store_path.into(),
            ..Default::default()
        }
    }
}

/// Capability set of a provisioning backend
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Registered name of this backend (e.g. "virtualbox")
    fn driver_name(&self) -> &str;

    /// Base fields this driver was constructed with
    fn base(&self) -> &BaseDriver;

    /// Apply caller-supplied parameters before creation
    async fn set_config_from_flags(&mut self, flags: &DriverFlags) -> Result<(), DriverError>;

    /// Provision the instance. Usually the slowest step of the workflow.
    async fn create(&mut self) -> Result<(), DriverError>;

    /// Driver state as stored alongside the host record
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}
