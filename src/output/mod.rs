//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output
//! - Progress bars
//! - Run summaries and rendition listings

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{print_banner, print_config_summary, print_error, print_info, print_success, print_warning};
pub use progress::{create_mirror_bar, create_spinner, set_fraction};
pub use stats::{format_renditions, print_renditions, print_run_summary};
