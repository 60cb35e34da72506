//! The "none" driver
//!
//! Registers an engine that already runs somewhere. Nothing is provisioned;
//! `create` only checks that an engine URL was configured.

use async_trait::async_trait;
use serde::Serialize;

use super::{BaseDriver, Driver, DriverContext, DriverError, DriverFlags};

pub const NONE_DRIVER_NAME: &str = "none";

/// Flag carrying the URL of the existing engine
const URL_FLAG: &str = "url";

#[derive(Debug, Clone, Serialize)]
pub struct NoneDriver {
    #[serde(flatten)]
    base: BaseDriver,

    #[serde(rename = "URL")]
    url: String,

    #[serde(skip)]
    ssh_client: super::SshClientType,
}

impl NoneDriver {
    pub fn new(base: BaseDriver, context: &DriverContext) -> Self {
        Self {
            base,
            url: String::new(),
            ssh_client: context.ssh_client,
        }
    }

    /// Engine URL adopted by this host
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Driver for NoneDriver {
    fn driver_name(&self) -> &str {
        NONE_DRIVER_NAME
    }

    fn base(&self) -> &BaseDriver {
        &self.base
    }

    async fn set_config_from_flags(&mut self, flags: &DriverFlags) -> Result<(), DriverError> {
        let url = flags.string(URL_FLAG);
        if url.is_empty() {
            return Err(DriverError::InvalidFlag {
                key: URL_FLAG.to_string(),
                reason: "an engine URL is required, e.g. tcp://10.0.0.5:2376".to_string(),
            });
        }
        if !url.contains("://") {
            return Err(DriverError::InvalidFlag {
                key: URL_FLAG.to_string(),
                reason: format!("'{url}' is not a URL"),
            });
        }
        self.url = url;
        Ok(())
    }

    async fn create(&mut self) -> Result<(), DriverError> {
        if self.url.is_empty() {
            return Err(DriverError::backend("no engine URL configured"));
        }
        tracing::debug!(
            machine = %self.base.machine_name,
            url = %self.url,
            ssh_client = %self.ssh_client,
            "adopting existing engine"
        );
        Ok(())
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
