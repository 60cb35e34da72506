//! Spinner shown while a machine is being created

use std::time::Duration;

use console::style;
use hostforge_core::ErrorKind;
use indicatif::{ProgressBar, ProgressStyle};

const TICK_CHARS: &str = "\u{28CB}\u{2819}\u{2839}\u{2838}\u{283C}\u{2834}\u{2826}\u{2827}\u{2807}\u{280F}";

/// Spinner with elapsed time for a single create request
///
/// A no-op in quiet mode.
pub struct CreateSpinner {
    bar: Option<ProgressBar>,
}

impl CreateSpinner {
    pub fn start(name: &str, driver_name: &str, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        // Fall back to the default spinner if the template fails to parse
        if let Ok(template) =
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed_precise:.dim})")
        {
            bar.set_style(template.tick_chars(TICK_CHARS));
        }
        bar.set_message(creating_message(name, driver_name));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Finish with a green checkmark
    pub fn created(self, name: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!(
                "{} Machine {} created",
                style("\u{2713}").green(),
                style(name).bold()
            ));
        }
    }

    /// Finish with a red cross naming the failure kind
    pub fn failed(self, name: &str, kind: ErrorKind) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!(
                "{} Machine {} not created ({})",
                style("\u{2717}").red(),
                style(name).bold(),
                kind
            ));
        }
    }
}

fn creating_message(name: &str, driver_name: &str) -> String {
    format!("Creating {} with the {} driver...", name, driver_name)
}
