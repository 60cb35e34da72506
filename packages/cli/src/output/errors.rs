//! Formatting for provisioning failures
//!
//! Every [`ProvisionError`] kind gets the error line plus whatever tip helps
//! the operator act on it.

use console::style;
use hostforge_core::{ErrorKind, ProvisionError};

/// Render a provisioning error with tips for the terminal
///
/// `drivers` lists the registered driver names, shown when the requested one
/// is unknown.
pub fn format_provision_error(err: &ProvisionError, drivers: &[&str]) -> String {
    let mut out = format!("{} {}\n", style("Error:").red().bold(), err);

    match err.kind() {
        ErrorKind::InvalidIdentity => {
            out.push_str(&format!(
                "\n  {} Use a name like {} or {}.\n",
                style("Tip:").cyan(),
                style("dev1").green(),
                style("web-01.staging").green()
            ));
        }
        ErrorKind::InvalidSwarmDiscovery => {
            out.push_str(&format!(
                "\n  {} Discovery URLs need a scheme, e.g. {}\n",
                style("Tip:").cyan(),
                style("token://<cluster-id>").green()
            ));
        }
        ErrorKind::HostAlreadyExists => {
            out.push_str(&format!(
                "\n  {} Pick another name or remove the existing machine first.\n",
                style("Tip:").cyan()
            ));
        }
        ErrorKind::UnknownDriver => {
            out.push_str(&format!(
                "\n  {} Available drivers: {}\n",
                style("Tip:").cyan(),
                drivers.join(", ")
            ));
        }
        ErrorKind::ConfigRejected => {
            out.push_str(&format!(
                "\n  {} Check the driver options passed with {}\n",
                style("Tip:").cyan(),
                style("-o KEY=VALUE").green()
            ));
        }
        ErrorKind::StoreUnavailable | ErrorKind::Cancelled => {
            out.push_str(&format!(
                "\n  {} Nothing was recorded; the same command can be retried.\n",
                style("Tip:").cyan()
            ));
        }
        ErrorKind::MalformedConfig | ErrorKind::CreationFailed | ErrorKind::PersistFailed => {}
    }

    if let Some(report) = err.crash_report() {
        out.push_str(&format!("\n  Driver:  {}\n", report.driver_name));
        out.push_str(&format!("  Step:    {} ({})\n", report.command, report.context));
        match &report.log_file_path {
            Some(path) => out.push_str(&format!(
                "  Log:     {}\n",
                style(path.display()).yellow()
            )),
            None => out.push_str("  Log:     none found\n"),
        }
    }

    if err.may_have_orphaned_resource() {
        out.push_str(&format!(
            "\n  {} The driver may have left a host behind with no machine record.\n  Check the backend and delete it by hand if needed.\n",
            style("Warning:").yellow().bold()
        ));
    }

    out
}

/// Print a provisioning error to stderr
pub fn show_provision_error(err: &ProvisionError, drivers: &[&str]) {
    eprintln!();
    eprint!("{}", format_provision_error(err, drivers));
}
