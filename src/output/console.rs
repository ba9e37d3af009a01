//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     hls-mirror                                        ║
║     Mirror HLS streams to local storage               ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(source: &str, selection: &str, directory: &str, live_minutes: Option<f64>) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Source: {}", source);
    println!("  Renditions: {}", selection);
    println!("  Directory: {}", directory);
    if let Some(minutes) = live_minutes {
        println!("  Live window: {} min", minutes);
    }
    println!();
}
