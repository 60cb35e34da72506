//! Crash reports for failed host creation
//!
//! A report ties the backend error to whatever diagnostic artifact the
//! backend is known to leave behind, so an operator can look at the
//! hypervisor's own logs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Diagnostic bundle for a failed creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    pub cause: String,
    pub command: String,
    pub context: String,
    pub driver_name: String,
    /// Backend log, when one was found on disk
    pub log_file_path: Option<PathBuf>,
}

impl CrashReport {
    /// Build a report, keeping `candidate_log_path` only if it exists
    pub async fn build(
        cause: &(dyn std::error::Error + Send + Sync),
        command: &str,
        context: &str,
        driver_name: &str,
        candidate_log_path: Option<&Path>,
    ) -> Self {
        let log_file_path = match candidate_log_path {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                Some(path.to_path_buf())
            }
            Some(path) => {
                tracing::debug!("No backend log at {}", path.display());
                None
            }
            None => None,
        };

        Self {
            cause: cause.to_string(),
            command: command.to_string(),
            context: context.to_string(),
            driver_name: driver_name.to_string(),
            log_file_path,
        }
    }
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed ({}, driver {}): {}",
            self.command, self.context, self.driver_name, self.cause
        )?;
        if let Some(path) = &self.log_file_path {
            write!(f, " (see {})", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for CrashReport {}

/// Where a backend writes its own log for a machine, if it is known to
pub fn backend_log_path(driver_name: &str, machines_dir: &Path, host_name: &str) -> Option<PathBuf> {
    match driver_name {
        "virtualbox" => Some(
            machines_dir
                .join(host_name)
                .join(host_name)
                .join("Logs")
                .join("VBox.log"),
        ),
        _ => None,
    }
}
