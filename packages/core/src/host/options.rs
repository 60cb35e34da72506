//! Host creation requests and option assembly
//!
//! A [`HostRequest`] carries what the caller asked for; [`build_host_options`]
//! turns it into the [`HostOptions`] attached to the new host. Fields the
//! caller left out fall back to [`OptionDefaults`]; fields the caller set are
//! copied through as-is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::schema::{AuthOptions, EngineOptions, HostOptions, SwarmOptions};
use crate::config::paths;
use crate::driver::DriverFlags;

/// Certificate locations supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertPaths {
    #[serde(default)]
    pub ca: Option<String>,

    #[serde(default)]
    pub ca_key: Option<String>,

    #[serde(default)]
    pub client: Option<String>,

    #[serde(default)]
    pub client_key: Option<String>,

    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub server_key: Option<String>,
}

/// A request to create one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostRequest {
    pub name: String,

    pub driver_name: String,

    /// Storage root for the machine (default: configured storage base)
    #[serde(default)]
    pub store_path: Option<String>,

    #[serde(default)]
    pub cert_paths: CertPaths,

    #[serde(default)]
    pub server_cert_sans: Vec<String>,

    #[serde(default)]
    pub engine: EngineOptions,

    #[serde(default)]
    pub swarm: SwarmOptions,

    /// Backend parameters handed to the driver
    #[serde(default)]
    pub driver_options: DriverFlags,
}

impl HostRequest {
    pub fn new(name: impl Into<String>, driver_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver_name: driver_name.into(),
            store_path: None,
            cert_paths: CertPaths::default(),
            server_cert_sans: Vec::new(),
            engine: EngineOptions::default(),
            swarm: SwarmOptions::default(),
            driver_options: DriverFlags::default(),
        }
    }

    /// Builder pattern: set store path
    pub fn with_store_path(mut self, path: impl Into<String>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Builder pattern: set driver options
    pub fn with_driver_options(mut self, flags: DriverFlags) -> Self {
        self.driver_options = flags;
        self
    }
}

/// Ambient locations used when a request leaves a path out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDefaults {
    pub store_path: PathBuf,
    pub cert_dir: PathBuf,
    pub machines_dir: PathBuf,
}

impl OptionDefaults {
    /// Standard layout beneath a storage base directory
    pub fn from_base(base: &Path) -> Self {
        Self {
            store_path: base.to_path_buf(),
            cert_dir: paths::cert_dir(base),
            machines_dir: paths::machines_dir(base),
        }
    }
}

/// Assemble the options bundle for a request
pub fn build_host_options(request: &HostRequest, defaults: &OptionDefaults) -> HostOptions {
    let certs = &request.cert_paths;
    let cert_dir = &defaults.cert_dir;
    let machine_dir = defaults.machines_dir.join(&request.name);

    let pick = |supplied: &Option<String>, fallback: PathBuf| {
        supplied.as_deref().map(PathBuf::from).unwrap_or(fallback)
    };

    HostOptions {
        auth: AuthOptions {
            cert_dir: cert_dir.clone(),
            ca_cert_path: pick(&certs.ca, cert_dir.join("ca.pem")),
            ca_private_key_path: pick(&certs.ca_key, cert_dir.join("ca-key.pem")),
            client_cert_path: pick(&certs.client, cert_dir.join("cert.pem")),
            client_key_path: pick(&certs.client_key, cert_dir.join("key.pem")),
            server_cert_path: pick(&certs.server, machine_dir.join("server.pem")),
            server_key_path: pick(&certs.server_key, machine_dir.join("server-key.pem")),
            store_path: pick(&request.store_path, defaults.store_path.clone()),
            server_cert_sans: request.server_cert_sans.clone(),
        },
        engine: request.engine.clone(),
        swarm: request.swarm.clone(),
    }
}
