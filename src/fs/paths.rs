//! Storage partition layout and download links.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::fs::naming::validate_path_component;

/// Directory holding every tool's uploads, relative to the storage root.
pub const UPLOADS_DIR: &str = "uploads";

/// Directory holding every tool's outputs, relative to the storage root.
pub const OUTPUTS_DIR: &str = "outputs";

/// Scratch space of running conversions, relative to the storage root.
///
/// Kept beside `outputs` so finished files can be renamed into place, but
/// outside the tree served under `/downloads`.
pub const WORK_DIR: &str = "work";

/// The upload and output directories owned by one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDirs {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Resolve a tool's partition under `root`, creating both directories.
///
/// Existing directories and their contents are left untouched.
pub fn tool_dirs(root: &Path, tool: &str) -> Result<ToolDirs> {
    let tool = validate_path_component(tool)?;

    let dirs = ToolDirs {
        upload_dir: root.join(UPLOADS_DIR).join(tool),
        output_dir: root.join(OUTPUTS_DIR).join(tool),
    };

    ensure_dir(&dirs.upload_dir)?;
    ensure_dir(&dirs.output_dir)?;

    Ok(dirs)
}

/// Resolve (and create) `<root>/work/<tool>`.
pub fn work_dir(root: &Path, tool: &str) -> Result<PathBuf> {
    let dir = root.join(WORK_DIR).join(validate_path_component(tool)?);
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Build `<download_base>/<tool>/<filename>` with each segment percent-encoded.
pub fn download_url(download_base: &Url, tool: &str, filename: &str) -> Result<String> {
    let mut url = download_base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            Error::Config(format!(
                "Download base URL cannot have path segments: {}",
                download_base
            ))
        })?
        .pop_if_empty()
        .push(tool)
        .push(filename);
    Ok(url.to_string())
}
