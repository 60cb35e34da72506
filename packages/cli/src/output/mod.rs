//! Output utilities for CLI commands
//!
//! Terminal helpers for the create flow: a spinner that reports the machine
//! being provisioned, and formatting for provisioning failures.

pub mod errors;
pub mod spinner;

pub use errors::{format_provision_error, show_provision_error};
pub use spinner::CreateSpinner;
