//! Error types for the convertd service.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the service.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // Naming errors
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error(
        "No free name for '{base}' in {} after {attempts} attempts",
        .directory.display()
    )]
    NamespaceExhausted {
        directory: PathBuf,
        base: String,
        attempts: u32,
    },

    // Request errors
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnsupportedFile(String),

    #[error("Invalid page range. PDF has {total} pages.")]
    InvalidPageRange { start: u32, end: u32, total: u32 },

    #[error("{0}")]
    NotFound(String),

    // External tool errors
    #[error("{0} not found. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("{program} failed: {message}")]
    ToolFailed { program: String, message: String },

    #[error("{program} timed out after {secs} seconds")]
    ToolTimeout { program: String, secs: u64 },

    #[error("Conversion failed: {0}")]
    Conversion(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Image errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // Upload stream errors
    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFilename(_)
                | Error::BadRequest(_)
                | Error::UnsupportedFile(_)
                | Error::InvalidPageRange { .. }
                | Error::Multipart(_)
        )
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 3;
    pub const SERVER_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
}
