//! Spinner utilities using indicatif for long-running service calls.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner with a message.
///
/// In JSON mode the spinner is hidden so machine-readable output stays clean.
pub fn create_spinner(message: impl Into<String>, json_mode: bool) -> ProgressBar {
    if json_mode {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Extension trait for ProgressBar to add common finishing messages
pub trait ProgressBarExt {
    /// Finish with a success message (checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with an error message (cross)
    fn finish_error(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✗ {}", message.into()));
    }
}
