//! Progress bar utilities.

use indicatif::{ProgressBar, ProgressStyle};

/// Resolution of the percent bar.
const STEPS: u64 = 1000;

/// Create a spinner for long-running operations.
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// Create a bar for a fractional progress value.
pub fn create_mirror_bar(message: &str) -> ProgressBar {
    let bar = ProgressBar::new(STEPS);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{percent:>3}}% ({{elapsed}})",
            message
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar
}

/// Move `bar` to `fraction` of its length.
pub fn set_fraction(bar: &ProgressBar, fraction: f64) {
    let position = (fraction.clamp(0.0, 1.0) * STEPS as f64).round() as u64;
    bar.set_position(position);
}
