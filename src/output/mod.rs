//! Output module for console output.
//!
//! Provides:
//! - Colored console messages
//! - Startup banner and configuration summary

pub mod console;

pub use console::{
    print_banner, print_config_summary, print_error, print_info, print_success, print_warning,
};
