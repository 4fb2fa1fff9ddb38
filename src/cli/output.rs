//! Output formatting and progress indicators
//!
//! User-facing summaries go to stdout with a status prefix; diagnostics go
//! through `tracing` to stderr.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg} [{elapsed}]")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Print a success line
pub fn print_success(message: &str) {
    println!("{} {message}", status::SUCCESS);
}

/// Print an error line
pub fn print_error(message: &str) {
    println!("{} {message}", status::ERROR);
}

/// Print a warning line
pub fn print_warning(message: &str) {
    println!("{} {message}", status::WARNING);
}

/// Print an info line
pub fn print_info(message: &str) {
    println!("{} {message}", status::INFO);
}

/// Print an indented detail line
pub fn print_detail(message: &str) {
    println!("    {message}");
}

/// Print a fatal error with its cause chain to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("    caused by: {cause}");
    }
}
