//! Driver registry
//!
//! Maps driver names to factories and builds new hosts bound to a backend.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::{BaseDriver, Driver, DriverContext, NONE_DRIVER_NAME, NoneDriver};
use crate::host::Host;

type DriverFactory = Arc<dyn Fn(BaseDriver, &DriverContext) -> Box<dyn Driver> + Send + Sync>;

/// Errors that can occur while resolving a driver
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No backend registered under this name
    #[error("Driver \"{0}\" not found. Do you have the plugin binary accessible in your PATH?")]
    UnknownDriver(String),

    /// The base driver configuration could not be decoded
    #[error("Malformed driver configuration: {0}")]
    MalformedConfig(#[from] serde_json::Error),
}

/// Registered provisioning backends
#[derive(Clone)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
    context: DriverContext,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .field("context", &self.context)
            .finish()
    }
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new(context: DriverContext) -> Self {
        Self {
            factories: HashMap::new(),
            context,
        }
    }

    /// Create a registry with the built-in drivers registered
    pub fn with_builtin(context: DriverContext) -> Self {
        let mut registry = Self::new(context);
        registry.register(NONE_DRIVER_NAME, |base, ctx| {
            Box::new(NoneDriver::new(base, ctx))
        });
        registry
    }

    /// Register a backend factory, replacing any previous one with this name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(BaseDriver, &DriverContext) -> Box<dyn Driver> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Registered driver names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn context(&self) -> &DriverContext {
        &self.context
    }

    /// Build a new host bound to `driver_name`
    ///
    /// `base_config` is the JSON-encoded [`BaseDriver`] for the new machine.
    pub fn resolve(&self, driver_name: &str, base_config: &[u8]) -> Result<Host, RegistryError> {
        let factory = self
            .factories
            .get(driver_name)
            .ok_or_else(|| RegistryError::UnknownDriver(driver_name.to_string()))?;

        let base: BaseDriver = serde_json::from_slice(base_config)?;
        let name = base.machine_name.clone();
        let driver = factory(base, &self.context);

        tracing::debug!(driver = driver_name, machine = %name, "resolved driver");

        Ok(Host::new(name, driver_name, driver))
    }
}
