//! Configuration validation logic.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_port(config.server.port)?;
    validate_cors_origins(&config.server.cors_origins)?;
    validate_download_base(&config.storage.download_base_url)?;
    validate_name_attempts(config.storage.max_name_attempts)?;
    validate_timeout(config.tools.timeout_secs)?;
    validate_office_binaries(&config.tools.office_binaries)?;
    validate_language(&config.speech.default_language)?;

    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate the listening port.
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(invalid("server.port", "Port must be non-zero"));
    }
    Ok(())
}

/// Validate that every CORS origin is an absolute http(s) origin.
pub fn validate_cors_origins(origins: &[String]) -> Result<()> {
    for origin in origins {
        let url = Url::parse(origin)
            .map_err(|e| invalid("server.cors_origins", format!("'{}': {}", origin, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "server.cors_origins",
                format!("'{}' must use http or https", origin),
            ));
        }
    }
    Ok(())
}

/// Validate the public download prefix.
pub fn validate_download_base(base: &str) -> Result<()> {
    let url = Url::parse(base)
        .map_err(|e| invalid("storage.download_base_url", format!("'{}': {}", base, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            "storage.download_base_url",
            format!("'{}' must use http or https", base),
        ));
    }

    if url.cannot_be_a_base() {
        return Err(invalid(
            "storage.download_base_url",
            format!("'{}' cannot carry a path", base),
        ));
    }

    Ok(())
}

/// Validate the naming probe cap.
pub fn validate_name_attempts(attempts: u32) -> Result<()> {
    if attempts == 0 {
        return Err(invalid(
            "storage.max_name_attempts",
            "At least one numbered candidate must be allowed",
        ));
    }
    Ok(())
}

/// Validate the external program timeout.
pub fn validate_timeout(secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(invalid("tools.timeout_secs", "Timeout must be non-zero"));
    }
    Ok(())
}

/// Validate the office binary fallback chain.
pub fn validate_office_binaries(binaries: &[String]) -> Result<()> {
    if binaries.iter().all(|b| b.trim().is_empty()) {
        return Err(invalid(
            "tools.office_binaries",
            "At least one office binary is required",
        ));
    }
    Ok(())
}

/// Validate a language code such as `en`, `fr` or `pt-BR`.
pub fn validate_language(code: &str) -> Result<()> {
    if !language_pattern().is_match(code) {
        return Err(invalid(
            "speech.default_language",
            format!("'{}' is not a language code", code),
        ));
    }
    Ok(())
}

fn language_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2,4})?$").expect("language pattern is valid")
    })
}
