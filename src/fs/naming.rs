//! Filename validation and collision-free output naming.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename could step out of its directory. With
/// separators rejected, only `.` and `..` themselves can do that; dots inside
/// a name (`Q1..Q2.pdf`) are kept.
pub fn sanitize_filename(name: &str) -> Result<String> {
    if name == "." || name == ".." {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Validate a tool identifier used as a storage directory name.
///
/// Unlike [`sanitize_filename`] nothing is rewritten: an identifier that
/// would need rewriting could alias another tool's partition.
pub fn validate_path_component(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidFilename(format!(
            "Invalid path component: '{}'",
            name
        )));
    }

    if name
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control())
    {
        return Err(Error::InvalidFilename(format!(
            "Path component contains reserved characters: '{}'",
            name
        )));
    }

    Ok(name)
}

/// Candidate name for probe `n`: `base.ext` first, then `base(1).ext`, `base(2).ext`, ...
///
/// `extension` includes its leading dot (or is empty).
pub fn candidate_name(base: &str, extension: &str, n: u32) -> String {
    if n == 0 {
        format!("{}{}", base, extension)
    } else {
        format!("{}({}){}", base, n, extension)
    }
}

/// Pick the first candidate name that does not exist in `directory`.
///
/// This is a pure existence scan: nothing is reserved, so two callers racing
/// on the same base name can both receive the same answer. Gaps are reused.
/// Creates `directory` if it is missing.
pub fn unique_filename(
    directory: &Path,
    base: &str,
    extension: &str,
    max_attempts: u32,
) -> Result<String> {
    std::fs::create_dir_all(directory)?;

    for n in 0..=max_attempts {
        let name = candidate_name(base, extension, n);
        if !directory.join(&name).exists() {
            return Ok(name);
        }
    }

    Err(exhausted(directory, base, max_attempts))
}

/// Claim the first free candidate name in `directory` by creating it.
///
/// Each probe is an exclusive create, so no two callers can ever be handed
/// the same name. The claimed file is left empty for the caller to overwrite.
pub fn reserve_unique_filename(
    directory: &Path,
    base: &str,
    extension: &str,
    max_attempts: u32,
) -> Result<String> {
    std::fs::create_dir_all(directory)?;

    for n in 0..=max_attempts {
        let name = candidate_name(base, extension, n);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(directory.join(&name))
        {
            Ok(_) => return Ok(name),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Err(exhausted(directory, base, max_attempts))
}

fn exhausted(directory: &Path, base: &str, max_attempts: u32) -> Error {
    tracing::warn!(
        directory = %directory.display(),
        base,
        max_attempts,
        "output namespace exhausted"
    );
    Error::NamespaceExhausted {
        directory: directory.to_path_buf(),
        base: base.to_string(),
        attempts: max_attempts,
    }
}
