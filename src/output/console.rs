//! Console output utilities.

use console::style;

use crate::config::{Config, Tool};

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
    let banner = format!(
        r#"
╔═══════════════════════════════════════════════════════╗
║     convertd {:<41}║
║     Office, PDF, image and speech conversions         ║
╚═══════════════════════════════════════════════════════╝
"#,
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(config: &Config) {
    let routes: Vec<&str> = Tool::ALL.iter().map(|t| t.route()).collect();

    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Listen: {}", config.bind_address());
    println!("  Storage: {}", config.storage.root.display());
    println!("  Downloads: {}", config.storage.download_base_url);
    println!("  Tool timeout: {}s", config.tools.timeout_secs);
    println!("  Tools: {}", routes.join(" "));
    println!();
}
