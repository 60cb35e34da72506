//! Host data model
//!
//! The option bundles attached to a host before creation, the in-memory
//! [`Host`] and the [`HostRecord`] written to the machine store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::Driver;

/// Schema version written into every host record
pub const HOST_RECORD_VERSION: u32 = 1;

/// TLS material the new host's engine is secured with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    pub cert_dir: PathBuf,
    pub ca_cert_path: PathBuf,
    pub ca_private_key_path: PathBuf,
    pub client_cert_path: PathBuf,
    pub client_key_path: PathBuf,
    pub server_cert_path: PathBuf,
    pub server_key_path: PathBuf,
    pub store_path: PathBuf,
    /// Extra subject alternative names for the server certificate
    #[serde(default)]
    pub server_cert_sans: Vec<String>,
}

/// Engine settings, passed through untouched to the provisioned host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    #[serde(default)]
    pub arbitrary_flags: Vec<String>,

    #[serde(default)]
    pub env: Vec<String>,

    #[serde(default)]
    pub insecure_registry: Vec<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub registry_mirror: Vec<String>,

    /// Storage driver (default: empty, the engine picks)
    #[serde(default)]
    pub storage_driver: String,

    /// Script used to install the engine (default: https://get.docker.com)
    #[serde(default = "default_install_url")]
    pub install_url: String,

    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

fn default_install_url() -> String {
    "https://get.docker.com".to_string()
}

fn default_tls_verify() -> bool {
    true
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            arbitrary_flags: Vec::new(),
            env: Vec::new(),
            insecure_registry: Vec::new(),
            labels: Vec::new(),
            registry_mirror: Vec::new(),
            storage_driver: String::new(),
            install_url: default_install_url(),
            tls_verify: default_tls_verify(),
        }
    }
}

/// Swarm membership settings, passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwarmOptions {
    #[serde(default)]
    pub is_swarm: bool,

    #[serde(default)]
    pub master: bool,

    #[serde(default)]
    pub agent: bool,

    /// Discovery service URL, e.g. `token://abc` or `consul://10.0.0.2:8500`
    #[serde(default)]
    pub discovery: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub strategy: String,

    #[serde(default)]
    pub arbitrary_flags: Vec<String>,

    #[serde(default)]
    pub env: Vec<String>,
}

/// Everything attached to a host besides its driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOptions {
    pub auth: AuthOptions,
    pub engine: EngineOptions,
    pub swarm: SwarmOptions,
}

/// A machine being created, bound to its provisioning backend
#[derive(Debug)]
pub struct Host {
    pub name: String,
    pub driver_name: String,
    pub driver: Box<dyn Driver>,
    pub host_options: HostOptions,
}

impl Host {
    pub fn new(
        name: impl Into<String>,
        driver_name: impl Into<String>,
        driver: Box<dyn Driver>,
    ) -> Self {
        Self {
            name: name.into(),
            driver_name: driver_name.into(),
            driver,
            host_options: HostOptions::default(),
        }
    }

    /// Snapshot of this host as written to the store
    pub fn to_record(&self) -> serde_json::Result<HostRecord> {
        Ok(HostRecord {
            version: HOST_RECORD_VERSION,
            name: self.name.clone(),
            driver_name: self.driver_name.clone(),
            driver: self.driver.to_json()?,
            host_options: self.host_options.clone(),
            created_at: Utc::now(),
        })
    }
}

/// Persisted form of a host (`<machines_dir>/<name>/config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub version: u32,
    pub name: String,
    pub driver_name: String,
    /// Driver-specific state, opaque to the store
    pub driver: serde_json::Value,
    pub host_options: HostOptions,
    pub created_at: DateTime<Utc>,
}
