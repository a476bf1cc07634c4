//! Configuration module for convertd.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Configuration validation
//! - The catalogue of conversion tools

pub mod loader;
pub mod tools;
pub mod validation;

pub use loader::{Config, ServerConfig, SpeechConfig, StorageConfig, ToolsConfig};
pub use tools::{input_extension, OutputExtension, OutputNaming, Tool};
pub use validation::{validate_config, validate_language};
